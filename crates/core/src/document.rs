//! Retrieval value objects.
//!
//! These flow through one retrieve → generate → reconcile cycle and are
//! discarded afterwards: Retriever produces `RetrievedDocument`s, renders
//! them into `ContextBlock`s and projects them into `Citation`s; the
//! reconciler packages the survivors into an `AnswerResult`.

use serde::{Deserialize, Serialize};

/// Header prefix of a rendered context block (`DOC [2501.00001v1]`).
pub const BLOCK_HEADER_PREFIX: &str = "DOC ";

/// Separator placed between rendered context blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// One candidate returned by the vector index for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Position of the document in the indexed corpus
    pub doc_index: u64,

    /// Stable external identifier (e.g. `2512.00772v1`)
    pub doc_id: String,

    pub title: String,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Similarity-search distance, lower is closer
    pub distance: f32,

    /// Relevance score from the reranker, when one ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl RetrievedDocument {
    pub fn new(
        doc_index: u64,
        doc_id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
        distance: f32,
    ) -> Self {
        Self {
            doc_index,
            doc_id: doc_id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            distance,
            rerank_score: None,
        }
    }

    /// Return a copy carrying the given abstract (used after truncation).
    pub fn with_abstract(self, abstract_text: impl Into<String>) -> Self {
        Self {
            abstract_text: abstract_text.into(),
            ..self
        }
    }

    /// Return a copy carrying a rerank score.
    pub fn with_rerank_score(self, score: f32) -> Self {
        Self {
            rerank_score: Some(score),
            ..self
        }
    }
}

/// A citation candidate returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub title: String,
    pub distance: f32,
    pub rerank_score: Option<f32>,
    /// Abstract page of the paper
    pub url: String,
}

impl From<&RetrievedDocument> for Citation {
    fn from(doc: &RetrievedDocument) -> Self {
        Self {
            doc_id: doc.doc_id.clone(),
            title: doc.title.clone(),
            distance: doc.distance,
            rerank_score: doc.rerank_score,
            url: format!("https://arxiv.org/abs/{}", doc.doc_id),
        }
    }
}

/// The text rendering of one document inside the context window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub doc_id: String,
    pub text: String,
}

impl ContextBlock {
    /// Render a document into its fixed block layout.
    pub fn render(doc: &RetrievedDocument) -> Self {
        let text = format!(
            "{BLOCK_HEADER_PREFIX}[{}]\nTitle: {}\nContent:\n{}",
            doc.doc_id, doc.title, doc.abstract_text
        );
        Self {
            doc_id: doc.doc_id.clone(),
            text,
        }
    }

    /// Length in characters, the unit the context budget is measured in.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// The final payload of one answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub retrieved_context: Vec<String>,
    pub used_ids: Vec<String>,
}
