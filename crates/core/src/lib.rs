//! # Scholar Core
//!
//! Domain types, traits, and error definitions for the Scholar
//! retrieval-augmented question answering service.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability (chat completion, embeddings, re-ranking,
//! nearest-neighbor search) is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod document;
pub mod error;
pub mod index;
pub mod message;
pub mod provider;
pub mod rerank;

// Re-export key types at crate root for ergonomics
pub use document::{AnswerResult, Citation, ContextBlock, RetrievedDocument};
pub use error::{Error, IndexError, ProviderError, Result};
pub use index::VectorIndex;
pub use message::{Message, Role};
pub use provider::{EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse};
pub use rerank::Reranker;
