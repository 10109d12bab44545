//! `scholar ask` — Answer one question from the terminal.

use scholar_rag::AnswerPipeline;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    query: &str,
    top_k: Option<usize>,
    debug: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let pipeline = AnswerPipeline::from_config(&config)?;

    let answered = pipeline.answer(query, top_k).await?;
    let result = &answered.result;

    println!("{}", result.answer);
    println!();

    if result.citations.is_empty() {
        println!("No retrieved document was cited.");
    } else {
        println!("Citations:");
        for c in &result.citations {
            println!("  [{}] {}", c.doc_id, c.title);
            println!("      {}", c.url);
        }
    }

    let unknown: Vec<&String> = result
        .used_ids
        .iter()
        .filter(|id| !result.citations.iter().any(|c| &c.doc_id == *id))
        .collect();
    if !unknown.is_empty() {
        println!();
        println!("⚠️  Cited but not retrieved: {}", join(&unknown));
    }

    if debug {
        println!();
        println!("Outcome: {:?} (top_k = {})", answered.outcome, answered.top_k);
        println!("Ranked candidates:");
        for (rank, doc) in answered.ranked.iter().enumerate() {
            let score = doc
                .rerank_score
                .map(|s| format!("  rerank {s:.4}"))
                .unwrap_or_default();
            println!("  {:>2}. {}  distance {:.4}{score}", rank + 1, doc.doc_id, doc.distance);
        }
    }

    Ok(())
}

fn join(ids: &[&String]) -> String {
    ids.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}
