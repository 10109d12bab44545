//! Scholar CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP answer service
//! - `ask`     — Answer one question from the terminal
//! - `search`  — Show what retrieval returns for a query
//! - `index`   — Rebuild the vector index from the corpus file
//! - `plan`    — Show the per-category collection quotas
//! - `config`  — Write or show the configuration file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "scholar",
    about = "Scholar — grounded question answering over research papers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config.toml (default: $SCHOLAR_CONFIG, then ./config/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP answer service
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer a single question
    Ask {
        /// The question
        query: String,

        /// Number of documents to ground the answer on
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the ranked candidates and generation outcome
        #[arg(long)]
        debug: bool,
    },

    /// Retrieve documents for a query without generating an answer
    Search {
        query: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print each document's truncated abstract
        #[arg(long)]
        show_abstract: bool,
    },

    /// Rebuild the vector index from the corpus file
    Index {
        /// Corpus JSONL file (default: corpus.save_path)
        #[arg(long)]
        corpus: Option<PathBuf>,
    },

    /// Show per-category quotas and the recency cutoff
    Plan,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask {
            query,
            top_k,
            debug,
        } => commands::ask::run(config_path, &query, top_k, debug).await?,
        Commands::Search {
            query,
            top_k,
            show_abstract,
        } => commands::search::run(config_path, &query, top_k, show_abstract).await?,
        Commands::Index { corpus } => commands::index::run(config_path, corpus).await?,
        Commands::Plan => commands::plan::run(config_path)?,
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force)?,
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
        },
    }

    Ok(())
}
