//! Query-time retrieval: embed, search, dedup, rerank, render.

use scholar_config::{AppConfig, RetrievalConfig};
use scholar_core::document::{Citation, RetrievedDocument};
use scholar_core::error::{Error, ProviderError, Result};
use scholar_core::provider::{EmbeddingRequest, Provider};
use scholar_core::{Reranker, VectorIndex};
use scholar_index::{FlatIndex, normalize};
use scholar_providers::{build_embedder, build_reranker};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::render_context;
use crate::truncate::truncate_by_sentences;

/// Tuning for one retriever, taken from `[retrieval]`.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub embedding_model: String,
    pub top_k: usize,
    pub initial_retrieval_k: usize,
    pub max_context_chars: usize,
    pub max_abstract_chars_per_doc: usize,
}

impl From<&RetrievalConfig> for RetrievalSettings {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            embedding_model: config.embedding_model.clone(),
            top_k: config.top_k,
            initial_retrieval_k: config.initial_retrieval_k,
            max_context_chars: config.max_context_chars,
            max_abstract_chars_per_doc: config.max_abstract_chars_per_doc,
        }
    }
}

/// What one retrieval hands to generation and reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutput {
    /// Rendered context blocks joined by the block separator
    pub retrieved_context: String,
    /// Projection of the top-k documents
    pub citations: Vec<Citation>,
    /// Every candidate after dedup and rerank, best first
    pub ranked: Vec<RetrievedDocument>,
}

/// Finds and formats the documents relevant to a query.
///
/// Shared read-only across concurrent requests.
pub struct Retriever {
    embedder: Arc<dyn Provider>,
    index: Arc<dyn VectorIndex>,
    reranker: Option<Arc<dyn Reranker>>,
    settings: RetrievalSettings,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Provider>,
        index: Arc<dyn VectorIndex>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            reranker: None,
            settings,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Open the index and build the embedding and reranking clients.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let retrieval = &config.retrieval;
        let index = FlatIndex::open(&retrieval.index_dir, &retrieval.collection)?;

        if let Some(manifest) = index.manifest() {
            if manifest.embedding_model != retrieval.embedding_model {
                warn!(
                    index_model = %manifest.embedding_model,
                    configured_model = %retrieval.embedding_model,
                    "Index was built with a different embedding model"
                );
            }
        }

        debug!(
            documents = index.len(),
            dimension = index.dimension(),
            "Index opened"
        );

        let embedder = build_embedder(retrieval, config.generation.api_key.as_deref())?;
        let mut retriever = Self::new(Arc::new(embedder), Arc::new(index), retrieval.into());
        if let Some(reranker) = build_reranker(&retrieval.reranker)? {
            retriever = retriever.with_reranker(Arc::new(reranker));
        }

        info!(
            collection = %retrieval.collection,
            documents = retriever.index.len(),
            reranker = retriever.reranker.is_some(),
            "Retriever ready"
        );
        Ok(retriever)
    }

    pub fn top_k(&self) -> usize {
        self.settings.top_k
    }

    /// Retrieve the `k` (default: configured `top_k`) best documents for
    /// `query` and render them as context.
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> Result<RetrievalOutput> {
        let k = k.unwrap_or(self.settings.top_k);
        let initial_k = self.settings.initial_retrieval_k.max(k);

        let query_vector = self.embed_query(query).await?;
        let candidates = self.index.search(&query_vector, initial_k).await?;
        debug!(candidates = candidates.len(), initial_k, "Vector search complete");

        let max_abstract = self.settings.max_abstract_chars_per_doc;
        let candidates: Vec<RetrievedDocument> = candidates
            .into_iter()
            .map(|doc| {
                let truncated = truncate_by_sentences(&doc.abstract_text, max_abstract);
                doc.with_abstract(truncated)
            })
            .collect();

        let deduped = dedup_by_doc_id(candidates);
        let ranked = match &self.reranker {
            Some(reranker) => rerank(reranker.as_ref(), query, deduped).await?,
            None => deduped,
        };

        let top: Vec<RetrievedDocument> = ranked.iter().take(k).cloned().collect();
        let retrieved_context = render_context(&top, self.settings.max_context_chars);
        let citations = top.iter().map(Citation::from).collect();

        debug!(
            ranked = ranked.len(),
            selected = top.len(),
            context_chars = retrieved_context.chars().count(),
            "Retrieval complete"
        );

        Ok(RetrievalOutput {
            retrieved_context,
            citations,
            ranked,
        })
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let response = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.settings.embedding_model.clone(),
                inputs: vec![query.to_string()],
            })
            .await?;

        let mut vector = response.embeddings.into_iter().next().ok_or_else(|| {
            Error::Provider(ProviderError::ApiError {
                status_code: 200,
                message: "Embedding response contained no vectors".into(),
            })
        })?;
        normalize(&mut vector);
        Ok(vector)
    }
}

/// Keep one document per `doc_id`: the lowest distance, at the position of
/// the id's first occurrence.
pub fn dedup_by_doc_id(docs: Vec<RetrievedDocument>) -> Vec<RetrievedDocument> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<RetrievedDocument> = Vec::with_capacity(docs.len());

    for doc in docs {
        match slots.get(&doc.doc_id) {
            Some(&i) => {
                if doc.distance < out[i].distance {
                    out[i] = doc;
                }
            }
            None => {
                slots.insert(doc.doc_id.clone(), out.len());
                out.push(doc);
            }
        }
    }
    out
}

/// Score every candidate and stable-sort by descending score.
async fn rerank(
    reranker: &dyn Reranker,
    query: &str,
    docs: Vec<RetrievedDocument>,
) -> Result<Vec<RetrievedDocument>> {
    if docs.is_empty() {
        return Ok(docs);
    }

    let texts: Vec<String> = docs
        .iter()
        .map(|d| format!("{}\n\n{}", d.title, d.abstract_text))
        .collect();
    let scores = reranker.score(query, &texts).await?;
    if scores.len() != docs.len() {
        return Err(ProviderError::ApiError {
            status_code: 200,
            message: format!(
                "Reranker returned {} scores for {} documents",
                scores.len(),
                docs.len()
            ),
        }
        .into());
    }

    let mut scored: Vec<RetrievedDocument> = docs
        .into_iter()
        .zip(scores)
        .map(|(doc, score)| doc.with_rerank_score(score))
        .collect();
    scored.sort_by(|a, b| {
        let a = a.rerank_score.unwrap_or(f32::NEG_INFINITY);
        let b = b.rerank_score.unwrap_or(f32::NEG_INFINITY);
        b.total_cmp(&a)
    });

    debug!(reranker = reranker.name(), count = scored.len(), "Reranked candidates");
    Ok(scored)
}
