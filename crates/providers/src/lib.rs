//! Model provider implementations for Scholar.
//!
//! Chat backends implement `scholar_core::Provider`; the reranker implements
//! `scholar_core::Reranker`. `backend` turns configuration into concrete
//! instances at startup.

pub mod backend;
#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod rerank;

pub use backend::{GenerationBackend, build_embedder, build_reranker};
#[cfg(feature = "local")]
pub use local::{LocalProvider, LocalSettings};
pub use openai_compat::OpenAiCompatProvider;
pub use rerank::HttpReranker;
