//! The answer pipeline: retrieve, generate, reconcile.

use scholar_config::AppConfig;
use scholar_core::document::{AnswerResult, RetrievedDocument};
use scholar_core::error::{Error, Result};
use std::time::Instant;
use tracing::{debug, info};

use crate::citations::reconcile;
use crate::generator::{AnswerGenerator, GenerationOutcome};
use crate::retriever::Retriever;

/// One answered question plus the diagnostics the debug view exposes.
#[derive(Debug, Clone)]
pub struct AnsweredQuery {
    pub result: AnswerResult,
    pub outcome: GenerationOutcome,
    pub ranked: Vec<RetrievedDocument>,
    pub top_k: usize,
}

/// Retriever and generator wired together. Built once at startup and
/// shared by every request.
pub struct AnswerPipeline {
    retriever: Retriever,
    generator: AnswerGenerator,
}

impl AnswerPipeline {
    pub fn new(retriever: Retriever, generator: AnswerGenerator) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let retriever = Retriever::from_config(config)?;
        let generator = AnswerGenerator::from_config(&config.generation)?;
        info!(backend = generator.backend_name(), "Answer pipeline ready");
        Ok(Self::new(retriever, generator))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Load the generation backend so the first request does not pay for it.
    pub async fn warm_up(&self) -> Result<()> {
        let started = Instant::now();
        self.generator.warm_up().await?;
        info!(
            backend = self.generator.backend_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation backend warmed up"
        );
        Ok(())
    }

    /// Answer `query` from the indexed corpus.
    pub async fn answer(&self, query: &str, top_k: Option<usize>) -> Result<AnsweredQuery> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidRequest("query must not be empty".into()));
        }
        let top_k = top_k.unwrap_or(self.retriever.top_k());
        if top_k == 0 {
            return Err(Error::InvalidRequest("top_k must be at least 1".into()));
        }
        debug!(top_k, "Answering query");

        let started = Instant::now();
        let retrieval = self.retriever.retrieve(query, Some(top_k)).await?;
        let generation = self
            .generator
            .generate(query, &retrieval.retrieved_context)
            .await?;

        let result = reconcile(
            generation.text,
            &retrieval.citations,
            &retrieval.retrieved_context,
        );

        info!(
            top_k,
            citations = result.citations.len(),
            used_ids = result.used_ids.len(),
            outcome = ?generation.outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Answered query"
        );

        Ok(AnsweredQuery {
            result,
            outcome: generation.outcome,
            ranked: retrieval.ranked,
            top_k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationSettings;
    use crate::retriever::RetrievalSettings;
    use crate::test_helpers::{FixedEmbedder, ScriptedProvider, StaticIndex, doc};
    use std::sync::Arc;

    fn pipeline(docs: Vec<RetrievedDocument>, responses: &[&str]) -> (AnswerPipeline, Arc<ScriptedProvider>) {
        let retriever = Retriever::new(
            Arc::new(FixedEmbedder::new(vec![1.0, 0.0])),
            Arc::new(StaticIndex::new(docs)),
            RetrievalSettings {
                embedding_model: "test-embed".into(),
                top_k: 5,
                initial_retrieval_k: 10,
                max_context_chars: 0,
                max_abstract_chars_per_doc: 1200,
            },
        );
        let provider = Arc::new(ScriptedProvider::new(responses));
        let generator = AnswerGenerator::new(
            provider.clone(),
            GenerationSettings {
                model: "mock-model".into(),
                temperature: 0.2,
                max_tokens: 400,
                stop: vec![],
            },
        );
        (AnswerPipeline::new(retriever, generator), provider)
    }

    #[tokio::test]
    async fn answer_reconciles_cited_documents() {
        let docs = vec![
            doc("2501.00001v1", 0.10),
            doc("2501.00002v1", 0.12),
            doc("2501.00003v1", 0.15),
        ];
        let answer = "(A) Yes [2501.00002v1].\n\nSources used:\n[2501.00002v1]: Title 2501.00002v1";
        let (pipeline, provider) = pipeline(docs, &[answer]);

        let answered = pipeline.answer("  Does it work?  ", None).await.unwrap();
        assert_eq!(answered.outcome, GenerationOutcome::Accepted);
        assert_eq!(answered.top_k, 5);
        assert_eq!(answered.ranked.len(), 3);
        assert_eq!(answered.result.answer, answer);
        assert_eq!(answered.result.used_ids, vec!["2501.00002v1"]);
        assert_eq!(answered.result.citations.len(), 1);
        assert_eq!(answered.result.retrieved_context.len(), 1);

        let request = &provider.requests()[0];
        assert!(request.messages[1].content.contains("User question:\nDoes it work?"));
        assert!(request.messages[1].content.contains("DOC [2501.00003v1]"));
    }

    #[tokio::test]
    async fn hallucinated_id_survives_in_used_ids_only() {
        let docs = vec![doc("2501.00001v1", 0.10)];
        let answer = "(A) It does [2599.99999v9].\n\nSources used:\n[2599.99999v9]: Unknown";
        let (pipeline, _) = pipeline(docs, &[answer]);

        let answered = pipeline.answer("q", Some(1)).await.unwrap();
        assert_eq!(answered.result.used_ids, vec!["2599.99999v9"]);
        assert!(answered.result.citations.is_empty());
        assert!(answered.result.retrieved_context.is_empty());
    }

    #[tokio::test]
    async fn uncited_retry_falls_back_to_full_context() {
        let docs = vec![doc("2501.00001v1", 0.10), doc("2501.00002v1", 0.20)];
        let (pipeline, provider) = pipeline(docs, &["plain text", "still plain"]);

        let answered = pipeline.answer("q", Some(2)).await.unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(answered.outcome, GenerationOutcome::Final);
        assert_eq!(answered.result.answer, "still plain");
        assert_eq!(answered.result.citations.len(), 2);
        assert_eq!(answered.result.retrieved_context.len(), 1);
        assert!(answered.result.used_ids.is_empty());
    }

    #[tokio::test]
    async fn warm_up_reaches_the_backend_once() {
        let (pipeline, provider) = pipeline(vec![doc("2501.00001v1", 0.1)], &[]);
        pipeline.warm_up().await.unwrap();
        assert_eq!(provider.warm_up_count(), 1);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn rejects_blank_query_and_zero_top_k() {
        let (pipeline, provider) = pipeline(vec![doc("2501.00001v1", 0.1)], &[]);

        assert!(matches!(
            pipeline.answer("   ", None).await,
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            pipeline.answer("q", Some(0)).await,
            Err(Error::InvalidRequest(_))
        ));
        assert_eq!(provider.call_count(), 0);
    }
}
