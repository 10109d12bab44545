//! `scholar plan` — Show per-category collection quotas.

use chrono::Datelike;
use scholar_corpus::{allocate_quotas, cutoff_year, plan_fetch};
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let corpus = &config.corpus;

    let targets = allocate_quotas(&corpus.categories, corpus.max_papers)?;
    let planned = plan_fetch(&targets, corpus.max_papers);
    let allocated: usize = targets.iter().map(|t| t.quota).sum();
    let year = chrono::Utc::now().year();

    println!("🗂️  Collection plan");
    println!("   Max papers: {}", corpus.max_papers);
    println!(
        "   Since:      {} (last {} years)",
        cutoff_year(year, corpus.recent_years),
        corpus.recent_years
    );
    println!();
    println!("   {:<16} {:>8} {:>8} {:>8}", "category", "weight", "quota", "fetch");
    for (target, fetch) in targets.iter().zip(&planned) {
        println!(
            "   {:<16} {:>8.3} {:>8} {:>8}",
            target.category_id, target.weight, target.quota, fetch.quota
        );
    }

    if allocated != corpus.max_papers {
        println!();
        println!(
            "   ⚠️  Quotas sum to {allocated}, not {}: every category keeps at least one paper",
            corpus.max_papers
        );
    }

    Ok(())
}
