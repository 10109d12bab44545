//! Reranker trait — second-stage (query, document) relevance scoring.
//!
//! A reranker is more precise but more expensive than vector distance, so it
//! only ever sees the short candidate list the index returned.

use async_trait::async_trait;

use crate::error::ProviderError;

#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    /// Score each document against the query.
    ///
    /// The returned vector is parallel to `documents`; higher means more relevant.
    async fn score(
        &self,
        query: &str,
        documents: &[String],
    ) -> std::result::Result<Vec<f32>, ProviderError>;
}
