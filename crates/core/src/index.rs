//! VectorIndex trait: nearest-neighbor search over the embedded corpus.
//!
//! The index is loaded once at startup and shared read-only by every
//! request, so implementations must be `Send + Sync` and searches take `&self`.

use async_trait::async_trait;

use crate::document::RetrievedDocument;
use crate::error::IndexError;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The index name (e.g., the collection it was opened from).
    fn name(&self) -> &str;

    /// Return up to `limit` documents ordered by ascending distance to `query`.
    ///
    /// Returned documents carry no rerank score.
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> std::result::Result<Vec<RetrievedDocument>, IndexError>;

    /// Number of indexed documents.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
