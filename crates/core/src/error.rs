//! Error types for the Scholar domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Startup failures (configuration, missing resources, empty corpus) and
//! per-request failures (validation, backend errors) share one top-level
//! enum so callers can decide how to surface them.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Scholar operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Backend failures (per request) ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    // --- Startup failures ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{kind} not found at {}", .path.display())]
    ResourceNotFound { kind: String, path: PathBuf },

    #[error("No valid records found in {} ({skipped} malformed rows skipped)", .path.display())]
    EmptyCorpus { path: PathBuf, skipped: usize },

    // --- Request validation ---
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // --- I/O & serialization ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a missing file or directory.
    pub fn not_found(kind: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::ResourceNotFound {
            kind: kind.into(),
            path: path.into(),
        }
    }

    /// Whether this error came from an embedding, reranking, generation or
    /// index backend rather than from the caller or the configuration.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Index(_))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Query vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt index row {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),
}
