//! `scholar search` — Inspect retrieval for a query.

use scholar_rag::Retriever;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    query: &str,
    top_k: Option<usize>,
    show_abstract: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    if query.trim().is_empty() {
        return Err("query must not be empty".into());
    }
    if top_k == Some(0) {
        return Err("top_k must be at least 1".into());
    }

    let retriever = Retriever::from_config(&config)?;
    let k = top_k.unwrap_or(retriever.top_k());
    let output = retriever.retrieve(query.trim(), Some(k)).await?;

    println!("🔍 Top {} of {} candidates", k.min(output.ranked.len()), output.ranked.len());
    for (rank, doc) in output.ranked.iter().take(k).enumerate() {
        let score = doc
            .rerank_score
            .map(|s| format!("  rerank {s:.4}"))
            .unwrap_or_default();
        println!();
        println!("{:>2}. [{}] {}", rank + 1, doc.doc_id, doc.title);
        println!("    distance {:.4}{score}", doc.distance);
        if show_abstract {
            println!("    {}", doc.abstract_text);
        }
    }

    println!();
    println!(
        "Context: {} chars, {} of {} documents within budget",
        output.retrieved_context.chars().count(),
        output.retrieved_context.matches("DOC [").count(),
        output.citations.len()
    );

    Ok(())
}
