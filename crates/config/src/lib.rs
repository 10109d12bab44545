//! Configuration loading, validation, and management for Scholar.
//!
//! Loads configuration from a TOML file (`--config`, `SCHOLAR_CONFIG`, or
//! `config/config.toml`) with environment variable overrides. The resulting
//! `AppConfig` is immutable and handed by reference to every component
//! constructor; nothing re-reads it afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SCHOLAR_CONFIG";

/// Config path used when neither `--config` nor `SCHOLAR_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Vector search, reranking and context assembly
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Answer generation backend
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Corpus collection and index build
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// HTTP server
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory holding the vector index
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Collection (table) name inside the index directory
    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// OpenAI-compatible endpoint serving `/embeddings`
    #[serde(default = "default_base_url")]
    pub embedding_url: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Candidates fetched from the index before dedup and rerank
    #[serde(default = "default_initial_retrieval_k")]
    pub initial_retrieval_k: usize,

    /// Character budget of the rendered context (0 = unlimited)
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_max_abstract_chars")]
    pub max_abstract_chars_per_doc: usize,

    #[serde(default)]
    pub reranker: RerankerConfig,
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("data/index")
}
fn default_collection() -> String {
    "papers".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_top_k() -> usize {
    5
}
fn default_initial_retrieval_k() -> usize {
    20
}
fn default_max_context_chars() -> usize {
    6000
}
fn default_max_abstract_chars() -> usize {
    1200
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            collection: default_collection(),
            embedding_model: default_embedding_model(),
            embedding_url: default_base_url(),
            top_k: default_top_k(),
            initial_retrieval_k: default_initial_retrieval_k(),
            max_context_chars: default_max_context_chars(),
            max_abstract_chars_per_doc: default_max_abstract_chars(),
            reranker: RerankerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_reranker_model")]
    pub model: String,

    /// Base URL of a TEI/Jina-style `/rerank` endpoint
    #[serde(default = "default_reranker_url")]
    pub url: String,

    /// Maximum characters of each document sent to the reranker
    #[serde(default = "default_reranker_max_length")]
    pub max_length: usize,
}

fn default_reranker_model() -> String {
    "BAAI/bge-reranker-base".into()
}
fn default_reranker_url() -> String {
    "http://localhost:8081".into()
}
fn default_reranker_max_length() -> usize {
    512
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_reranker_model(),
            url: default_reranker_url(),
            max_length: default_reranker_max_length(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Backend selector: "hosted" or "local"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// OpenAI-compatible chat endpoint (hosted backend)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name (hosted) or preset alias (local, when no `model_path`)
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// GGUF file for the local backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HuggingFace repo for `tokenizer.json` when none sits next to the GGUF file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_repo: Option<String>,

    /// Prompt context length in tokens (local backend)
    #[serde(default = "default_n_ctx")]
    pub n_ctx: usize,

    /// Inference threads (local backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_threads: Option<usize>,

    #[serde(default)]
    pub stop: Vec<String>,
}

fn default_backend() -> String {
    "hosted".into()
}
fn default_model() -> String {
    "llama3.1:8b".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    400
}
fn default_n_ctx() -> usize {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("model_path", &self.model_path)
            .field("tokenizer_repo", &self.tokenizer_repo)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("n_ctx", &self.n_ctx)
            .field("n_threads", &self.n_threads)
            .field("stop", &self.stop)
            .finish()
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            model_path: None,
            tokenizer_repo: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            n_ctx: default_n_ctx(),
            n_threads: None,
            stop: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// JSONL file of paper records
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,

    #[serde(default)]
    pub categories: Vec<CategoryConfig>,

    /// Global maximum number of papers across all categories
    #[serde(default = "default_max_papers")]
    pub max_papers: usize,

    /// Only papers from the last N calendar years
    #[serde(default = "default_recent_years")]
    pub recent_years: u32,

    /// Records per fetch page and per embedding batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between feed requests
    #[serde(default = "default_request_sleep")]
    pub request_sleep_seconds: f64,

    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
}

fn default_save_path() -> PathBuf {
    PathBuf::from("data/papers.jsonl")
}
fn default_max_papers() -> usize {
    5000
}
fn default_recent_years() -> u32 {
    3
}
fn default_batch_size() -> usize {
    100
}
fn default_request_sleep() -> f64 {
    3.0
}
fn default_flush_every() -> usize {
    100
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
            categories: vec![],
            max_papers: default_max_papers(),
            recent_years: default_recent_years(),
            batch_size: default_batch_size(),
            request_sleep_seconds: default_request_sleep(),
            flush_every: default_flush_every(),
        }
    }
}

/// A feed category and its share of the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub id: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Concurrent retrieval+generation units
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_workers() -> usize {
    4
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            workers: default_workers(),
        }
    }
}

impl AppConfig {
    /// Load configuration, resolving the path from the argument, then
    /// `SCHOLAR_CONFIG`, then `config/config.toml`.
    ///
    /// Environment overrides are applied after parsing:
    /// - `SCHOLAR_INDEX_DIR` → `retrieval.index_dir`
    /// - `SCHOLAR_API_KEY` → `generation.api_key`
    /// - `SCHOLAR_MODEL_PATH` → `generation.model_path`
    /// - `SCHOLAR_N_CTX` / `SCHOLAR_N_THREADS` → local backend tuning
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = Self::resolve_path(path, |key| std::env::var(key).ok());
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(explicit: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        match explicit {
            Some(p) => p.to_path_buf(),
            None => env(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        }
    }

    /// Load configuration from a specific file path.
    ///
    /// Unlike a user-level dotfile, the service cannot run on defaults alone:
    /// a missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = env("SCHOLAR_INDEX_DIR") {
            self.retrieval.index_dir = PathBuf::from(dir);
        }
        if let Some(key) = env("SCHOLAR_API_KEY") {
            self.generation.api_key = Some(key);
        }
        if let Some(model_path) = env("SCHOLAR_MODEL_PATH") {
            self.generation.model_path = Some(PathBuf::from(model_path));
        }
        if let Some(n_ctx) = env("SCHOLAR_N_CTX") {
            self.generation.n_ctx = parse_env("SCHOLAR_N_CTX", &n_ctx)?;
        }
        if let Some(n_threads) = env("SCHOLAR_N_THREADS") {
            self.generation.n_threads = Some(parse_env("SCHOLAR_N_THREADS", &n_threads)?);
        }
        Ok(())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        if self.generation.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_tokens must be at least 1".into(),
            ));
        }

        if self.corpus.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "corpus.batch_size must be at least 1".into(),
            ));
        }

        if self.gateway.workers == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.workers must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Path of the index collection file.
    pub fn collection_path(&self) -> PathBuf {
        self.retrieval
            .index_dir
            .join(format!("{}.jsonl", self.retrieval.collection))
    }

    /// Generate a default config TOML string (for `scholar config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} has invalid value '{value}'")))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file at {}: {reason}", .path.display())]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {}: {reason}", .path.display())]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for scholar_core::Error {
    fn from(e: ConfigError) -> Self {
        scholar_core::Error::config(e.to_string())
    }
}
