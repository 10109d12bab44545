//! `scholar index` — Rebuild the vector index from the corpus file.

use scholar_corpus::IndexBuilder;
use scholar_providers::build_embedder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn run(config_path: Option<&Path>, corpus: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let corpus = corpus.unwrap_or_else(|| config.corpus.save_path.clone());

    let embedder = build_embedder(&config.retrieval, config.generation.api_key.as_deref())?;
    let builder = IndexBuilder::from_config(&config, Arc::new(embedder));

    println!("📥 Indexing {}", corpus.display());
    println!("   Model:      {}", config.retrieval.embedding_model);
    println!("   Collection: {}", config.collection_path().display());

    let report = builder.build(&corpus).await?;

    println!();
    println!("   ✅ Indexed {} papers ({} rows skipped)", report.indexed, report.skipped);
    println!("   Dimension:  {}", report.manifest.dimension);
    println!("   Built at:   {}", report.manifest.built_at.to_rfc3339());

    Ok(())
}
