//! Cross-encoder reranking over HTTP.
//!
//! Talks to a TEI-style `/rerank` endpoint (text-embeddings-inference,
//! Infinity, Jina-compatible servers): the query and candidate texts go in,
//! one relevance score per text comes back.

use async_trait::async_trait;
use scholar_core::error::ProviderError;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A reranker backed by an HTTP scoring service.
pub struct HttpReranker {
    model: String,
    base_url: String,
    /// Documents are cut to this many characters before scoring
    max_length: usize,
    client: reqwest::Client,
}

impl HttpReranker {
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        max_length: usize,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_length,
            client,
        })
    }

    fn truncate(&self, text: &str) -> String {
        if self.max_length == 0 {
            return text.to_string();
        }
        text.chars().take(self.max_length).collect()
    }
}

#[async_trait]
impl scholar_core::Reranker for HttpReranker {
    fn name(&self) -> &str {
        &self.model
    }

    async fn score(
        &self,
        query: &str,
        documents: &[String],
    ) -> std::result::Result<Vec<f32>, ProviderError> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/rerank", self.base_url);
        let texts: Vec<String> = documents.iter().map(|d| self.truncate(d)).collect();
        let body = serde_json::json!({
            "model": self.model,
            "query": query,
            "texts": texts,
            "truncate": true,
        });

        debug!(model = %self.model, count = texts.len(), "Sending rerank request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Reranker returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let scored: Vec<RerankItem> = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse rerank response: {e}"),
        })?;

        scores_by_index(scored, documents.len())
    }
}

#[derive(Debug, Deserialize)]
struct RerankItem {
    index: usize,
    score: f32,
}

/// Lay scores out parallel to the input; servers return them sorted by score.
fn scores_by_index(items: Vec<RerankItem>, count: usize) -> Result<Vec<f32>, ProviderError> {
    let mut scores: Vec<Option<f32>> = vec![None; count];
    for item in items {
        let slot = scores.get_mut(item.index).ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: format!("Rerank index {} out of range", item.index),
        })?;
        *slot = Some(item.score);
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: format!("No rerank score for document {i}"),
            })
        })
        .collect()
}
