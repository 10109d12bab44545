//! Shared test doubles for the retrieval and generation tests.

use async_trait::async_trait;
use scholar_core::document::RetrievedDocument;
use scholar_core::error::{IndexError, ProviderError};
use scholar_core::message::Message;
use scholar_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use scholar_core::{Reranker, VectorIndex};
use std::sync::Mutex;

/// A provider that returns scripted completions in sequence and records
/// every request it receives.
///
/// Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
    warm_ups: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|s| s.to_string()).collect(),
            requests: Mutex::new(vec![]),
            warm_ups: Mutex::new(0),
        }
    }

    pub fn warm_up_count(&self) -> usize {
        *self.warm_ups.lock().unwrap()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let call = requests.len();
        let text = self.responses.get(call).unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more responses (call #{call}, have {})",
                self.responses.len()
            )
        });
        requests.push(request);
        Ok(make_text_response(text))
    }

    async fn warm_up(&self) -> Result<(), ProviderError> {
        *self.warm_ups.lock().unwrap() += 1;
        Ok(())
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        metadata: serde_json::Map::new(),
    }
}

/// An embedder returning the same vector for every input.
pub struct FixedEmbedder {
    pub vector: Vec<f32>,
    pub inputs: Mutex<Vec<String>>,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            inputs: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl Provider for FixedEmbedder {
    fn name(&self) -> &str {
        "fixed_embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("embedder only".into()))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.inputs.lock().unwrap().extend(request.inputs.iter().cloned());
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|_| self.vector.clone()).collect(),
            model: request.model,
            usage: None,
        })
    }
}

/// An index returning a fixed candidate list and recording the query.
pub struct StaticIndex {
    pub docs: Vec<RetrievedDocument>,
    pub queries: Mutex<Vec<(Vec<f32>, usize)>>,
}

impl StaticIndex {
    pub fn new(docs: Vec<RetrievedDocument>) -> Self {
        Self {
            docs,
            queries: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl VectorIndex for StaticIndex {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<RetrievedDocument>, IndexError> {
        self.queries.lock().unwrap().push((query.to_vec(), limit));
        Ok(self.docs.iter().take(limit).cloned().collect())
    }

    fn len(&self) -> usize {
        self.docs.len()
    }
}

/// Scores 1.0 for documents containing `keyword`, 0.0 otherwise.
pub struct KeywordReranker {
    pub keyword: String,
}

#[async_trait]
impl Reranker for KeywordReranker {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>, ProviderError> {
        Ok(documents
            .iter()
            .map(|d| if d.contains(&self.keyword) { 1.0 } else { 0.0 })
            .collect())
    }
}

pub fn doc(id: &str, distance: f32) -> RetrievedDocument {
    RetrievedDocument::new(0, id, format!("Title {id}"), format!("Abstract of {id}."), distance)
}
