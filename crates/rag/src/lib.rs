//! Retrieval-augmented answering for Scholar.
//!
//! # Flow
//!
//! 1. `Retriever` embeds the query, searches the index, deduplicates,
//!    optionally reranks and renders a budgeted context
//! 2. `AnswerGenerator` asks the generation backend for a cited answer,
//!    retrying once if the output format is violated
//! 3. `citations::reconcile` matches cited ids against what was retrieved
//!
//! `AnswerPipeline` runs the three steps as one unit of work.

pub mod citations;
pub mod context;
pub mod generator;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod truncate;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use citations::{extract_citation_ids, reconcile};
pub use context::render_context;
pub use generator::{AnswerGenerator, Generation, GenerationOutcome, GenerationSettings};
pub use pipeline::{AnswerPipeline, AnsweredQuery};
pub use retriever::{RetrievalOutput, RetrievalSettings, Retriever};
pub use truncate::truncate_by_sentences;
