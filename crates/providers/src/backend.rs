//! Construction of providers from configuration.
//!
//! Generation backends form a closed set chosen once at startup; an
//! unsupported selector or a missing required parameter fails construction.

use async_trait::async_trait;
use scholar_config::{GenerationConfig, RerankerConfig, RetrievalConfig};
use scholar_core::error::{Error, ProviderError};
use scholar_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tracing::info;

#[cfg(feature = "local")]
use crate::local::{LocalProvider, LocalSettings};
use crate::openai_compat::OpenAiCompatProvider;
use crate::rerank::HttpReranker;

/// The generation backend: a hosted chat endpoint or an in-process model.
pub enum GenerationBackend {
    Hosted(OpenAiCompatProvider),
    #[cfg(feature = "local")]
    Local(LocalProvider),
}

impl GenerationBackend {
    pub fn from_config(config: &GenerationConfig) -> Result<Self, Error> {
        match config.backend.as_str() {
            "hosted" => {
                let api_key = config.api_key.clone().unwrap_or_default();
                let provider = OpenAiCompatProvider::new("hosted", &config.base_url, api_key)
                    .map_err(|e| Error::config(e.to_string()))?;
                info!(base_url = %config.base_url, model = %config.model, "Using hosted generation backend");
                Ok(Self::Hosted(provider))
            }
            "local" => Self::local(config),
            other => Err(Error::config(format!(
                "Unsupported generation backend '{other}' (expected 'hosted' or 'local')"
            ))),
        }
    }

    #[cfg(feature = "local")]
    fn local(config: &GenerationConfig) -> Result<Self, Error> {
        let model_path = config
            .model_path
            .clone()
            .ok_or_else(|| Error::config("generation.model_path is required for the local backend"))?;

        let provider = LocalProvider::new(LocalSettings {
            model_path,
            tokenizer_repo: config.tokenizer_repo.clone(),
            n_ctx: config.n_ctx,
            n_threads: config.n_threads,
        })
        .map_err(|e| Error::config(e.to_string()))?;
        info!(model = %config.model, "Using local generation backend");
        Ok(Self::Local(provider))
    }

    #[cfg(not(feature = "local"))]
    fn local(config: &GenerationConfig) -> Result<Self, Error> {
        if config.model_path.is_none() {
            return Err(Error::config(
                "generation.model_path is required for the local backend",
            ));
        }
        Err(Error::config(
            "the local backend requires building with the `local` feature",
        ))
    }

    fn inner(&self) -> &dyn Provider {
        match self {
            Self::Hosted(p) => p,
            #[cfg(feature = "local")]
            Self::Local(p) => p,
        }
    }
}

#[async_trait]
impl Provider for GenerationBackend {
    fn name(&self) -> &str {
        self.inner().name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.inner().complete(request).await
    }

    async fn warm_up(&self) -> std::result::Result<(), ProviderError> {
        self.inner().warm_up().await
    }
}

/// Build the embedding client for the query and corpus encoder.
pub fn build_embedder(config: &RetrievalConfig, api_key: Option<&str>) -> Result<OpenAiCompatProvider, Error> {
    OpenAiCompatProvider::new("embeddings", &config.embedding_url, api_key.unwrap_or_default())
        .map_err(|e| Error::config(e.to_string()))
}

/// Build the reranker, or `None` when reranking is disabled.
pub fn build_reranker(config: &RerankerConfig) -> Result<Option<HttpReranker>, Error> {
    if !config.enabled {
        return Ok(None);
    }
    info!(model = %config.model, url = %config.url, "Reranking enabled");
    HttpReranker::new(&config.model, &config.url, config.max_length)
        .map(Some)
        .map_err(|e| Error::config(e.to_string()))
}
