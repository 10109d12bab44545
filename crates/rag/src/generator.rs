//! Grounded answer generation with a single compliance retry.
//!
//! ```text
//! Drafted → Checked ─┬─ compliant ──────────────→ Accepted
//!                    └─ non-compliant → Retried → Final
//! ```
//!
//! The retry runs at temperature 0 and its output is returned unchecked.

use scholar_config::GenerationConfig;
use scholar_core::error::Result;
use scholar_core::provider::{Provider, ProviderRequest};
use scholar_providers::GenerationBackend;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::prompt::{SOURCES_MARKER, build_messages, build_retry_messages};

/// Terminal state of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// The first draft met the output contract
    Accepted,
    /// The draft was rejected and the corrective retry's output returned
    Final,
}

/// A generated answer and how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub outcome: GenerationOutcome,
}

/// Sampling parameters for the generation backend.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl From<&GenerationConfig> for GenerationSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
        }
    }
}

/// Produces cited answers from a question and its rendered context.
pub struct AnswerGenerator {
    backend: Arc<dyn Provider>,
    settings: GenerationSettings,
}

impl AnswerGenerator {
    pub fn new(backend: Arc<dyn Provider>, settings: GenerationSettings) -> Self {
        Self { backend, settings }
    }

    /// Select and construct the configured backend.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let backend = GenerationBackend::from_config(config)?;
        Ok(Self::new(Arc::new(backend), config.into()))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Load the backend ahead of the first request.
    pub async fn warm_up(&self) -> Result<()> {
        self.backend.warm_up().await?;
        Ok(())
    }

    /// Generate an answer, retrying once at temperature 0 if the draft lacks
    /// the sources section or any bracketed citation.
    pub async fn generate(&self, query: &str, context: &str) -> Result<Generation> {
        let messages = build_messages(query, context);

        let draft = self.call(messages.clone(), self.settings.temperature).await?;
        if is_compliant(&draft) {
            debug!(len = draft.len(), "Draft accepted");
            return Ok(Generation {
                text: draft,
                outcome: GenerationOutcome::Accepted,
            });
        }

        warn!(len = draft.len(), "Draft violated output format, retrying once");
        let text = self.call(build_retry_messages(&messages), 0.0).await?;
        info!(compliant = is_compliant(&text), "Retry complete");

        Ok(Generation {
            text,
            outcome: GenerationOutcome::Final,
        })
    }

    async fn call(
        &self,
        messages: Vec<scholar_core::Message>,
        temperature: f32,
    ) -> Result<String> {
        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages,
            temperature,
            max_tokens: Some(self.settings.max_tokens),
            stop: self.settings.stop.clone(),
        };

        let response = self.backend.complete(request).await?;
        Ok(response.message.content.trim().to_string())
    }
}

/// Whether `text` carries the sources marker and both square brackets.
/// Bracket order is not checked.
pub fn is_compliant(text: &str) -> bool {
    text.contains(SOURCES_MARKER) && text.contains('[') && text.contains(']')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::CORRECTIVE_PROMPT;
    use crate::test_helpers::ScriptedProvider;
    use scholar_core::message::{Message, Role};

    const COMPLIANT: &str = "(A) Supported. Sparse retrieval helps [2501.00001v1].\n\nSources used:\n[2501.00001v1]: Sparse Retrieval";

    fn settings() -> GenerationSettings {
        GenerationSettings {
            model: "mock-model".into(),
            temperature: 0.2,
            max_tokens: 400,
            stop: vec!["</s>".into()],
        }
    }

    #[test]
    fn compliance_check() {
        assert!(is_compliant("Answer. Sources used: [X]: title"));
        assert!(!is_compliant("Answer [2501.00001v1] with no source list"));
        assert!(!is_compliant("Sources used: none"));
        assert!(!is_compliant("Sources used: [2501.00001v1 unclosed"));
        assert!(is_compliant("Sources used: ] backwards ["));
    }

    #[tokio::test]
    async fn compliant_draft_is_accepted_without_retry() {
        let provider = Arc::new(ScriptedProvider::new(&[&format!("  {COMPLIANT}\n")]));
        let generator = AnswerGenerator::new(provider.clone(), settings());

        let generation = generator.generate("What helps?", "DOC [2501.00001v1]").await.unwrap();
        assert_eq!(generation.outcome, GenerationOutcome::Accepted);
        assert_eq!(generation.text, COMPLIANT);
        assert_eq!(provider.call_count(), 1);

        let request = &provider.requests()[0];
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, Some(400));
        assert_eq!(request.stop, vec!["</s>".to_string()]);
        assert_eq!(request.messages.len(), 2);
    }

    #[tokio::test]
    async fn non_compliant_draft_retried_once_at_zero_temperature() {
        let provider = Arc::new(ScriptedProvider::new(&["No citations here.", COMPLIANT]));
        let generator = AnswerGenerator::new(provider.clone(), settings());

        let generation = generator.generate("What helps?", "ctx").await.unwrap();
        assert_eq!(generation.outcome, GenerationOutcome::Final);
        assert_eq!(generation.text, COMPLIANT);
        assert_eq!(provider.call_count(), 2);

        let requests = provider.requests();
        assert_eq!(requests[1].temperature, 0.0);
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(&requests[1].messages[..2], &requests[0].messages[..]);
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last, &Message::user(CORRECTIVE_PROMPT));
    }

    #[tokio::test]
    async fn retry_output_returned_even_if_still_non_compliant() {
        let provider = Arc::new(ScriptedProvider::new(&["first miss", "  second miss  "]));
        let generator = AnswerGenerator::new(provider.clone(), settings());

        let generation = generator.generate("q", "ctx").await.unwrap();
        assert_eq!(generation.text, "second miss");
        assert_eq!(generation.outcome, GenerationOutcome::Final);
        assert_eq!(provider.call_count(), 2);
    }

    #[test]
    fn unknown_backend_fails_at_construction() {
        let config = GenerationConfig {
            backend: "cloud".into(),
            ..Default::default()
        };
        assert!(matches!(
            AnswerGenerator::from_config(&config),
            Err(scholar_core::Error::Config { .. })
        ));
    }
}
