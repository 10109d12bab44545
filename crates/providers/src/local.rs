//! Local inference provider — runs a GGUF model in-process.
//!
//! Uses [Candle](https://github.com/huggingface/candle) to run quantized
//! Llama-architecture models (Llama 2/3, TinyLlama, Mistral, Qwen) on the CPU
//! with no network dependency at answer time.
//!
//! The GGUF file comes from `generation.model_path`. The tokenizer is read from
//! a `tokenizer.json` next to it, or downloaded once from the HuggingFace Hub
//! when `tokenizer_repo` is given.

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama as qlm;
use hf_hub::api::sync::Api;
use scholar_core::error::ProviderError;
use scholar_core::message::{Message, Role};
use scholar_core::provider::{ProviderRequest, ProviderResponse, Usage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Sampling seed; generation is reproducible for a given prompt.
const SEED: u64 = 42;

/// Chat template format used to structure messages for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatTemplate {
    /// `<|system|>\n{content}</s>\n<|user|>\n{content}</s>\n<|assistant|>\n`
    TinyLlama,
    /// `<|im_start|>system\n{content}<|im_end|>\n...<|im_start|>assistant\n`
    ChatML,
    /// `[INST] <<SYS>>{system}<</SYS>> {content} [/INST]`
    Llama2,
    /// `<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n{content}<|eot_id|>`
    Llama3,
}

impl ChatTemplate {
    /// Guess the template from the GGUF file name.
    fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.contains("tinyllama") {
            ChatTemplate::TinyLlama
        } else if name.contains("llama-3") || name.contains("llama3") {
            ChatTemplate::Llama3
        } else if name.contains("llama-2") || name.contains("llama2") || name.contains("mistral")
        {
            ChatTemplate::Llama2
        } else {
            ChatTemplate::ChatML
        }
    }

    fn format(self, messages: &[Message]) -> String {
        match self {
            ChatTemplate::TinyLlama => format_tinyllama(messages),
            ChatTemplate::ChatML => format_chatml(messages),
            ChatTemplate::Llama2 => format_llama2(messages),
            ChatTemplate::Llama3 => format_llama3(messages),
        }
    }
}

/// Settings for the local backend, taken from `[generation]`.
#[derive(Debug, Clone)]
pub struct LocalSettings {
    pub model_path: PathBuf,
    /// HuggingFace repo to fetch `tokenizer.json` from when none sits next to the model
    pub tokenizer_repo: Option<String>,
    /// Context window in tokens; prompts are cut from the front to fit
    pub n_ctx: usize,
    /// Intra-op thread hint; Candle sizes its CPU pool from `RAYON_NUM_THREADS`
    pub n_threads: Option<usize>,
}

// ── Local Provider ─────────────────────────────────────────────────────

/// A provider that runs a GGUF-quantized language model locally via Candle.
///
/// The model sits behind a Mutex because Candle inference mutates the KV
/// cache and is single-threaded per model.
pub struct LocalProvider {
    inner: Arc<Mutex<Option<LocalModelState>>>,
    settings: LocalSettings,
}

/// The loaded model state (tokenizer + weights).
struct LocalModelState {
    model: qlm::ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    chat_template: ChatTemplate,
    eos_token_id: u32,
}

impl LocalProvider {
    /// Create a local provider. The model file must exist; weights are
    /// loaded lazily on the first request.
    pub fn new(settings: LocalSettings) -> Result<Self, ProviderError> {
        if !settings.model_path.is_file() {
            return Err(ProviderError::NotConfigured(format!(
                "local model file not found at {}",
                settings.model_path.display()
            )));
        }
        if settings.n_ctx == 0 {
            return Err(ProviderError::NotConfigured(
                "n_ctx must be at least 1".into(),
            ));
        }
        if let Some(n) = settings.n_threads {
            debug!(n_threads = n, "Local backend thread hint");
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(None)),
            settings,
        })
    }

    async fn ensure_loaded(&self) -> Result<(), ProviderError> {
        let mut state = self.inner.lock().await;
        if state.is_some() {
            return Ok(());
        }

        info!(path = %self.settings.model_path.display(), "Loading local model");
        let settings = self.settings.clone();
        let loaded = tokio::task::spawn_blocking(move || LocalModelState::load(&settings))
            .await
            .map_err(|e| ProviderError::Inference(format!("Model loading task failed: {e}")))??;

        *state = Some(loaded);
        Ok(())
    }
}

impl LocalModelState {
    fn load(settings: &LocalSettings) -> Result<Self, ProviderError> {
        let device = Device::Cpu;
        let path = settings.model_path.as_path();

        let mut file = std::fs::File::open(path)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to open GGUF file: {e}")))?;

        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to parse GGUF file: {e}")))?;

        let model = qlm::ModelWeights::from_gguf(gguf, &mut file, &device).map_err(|e| {
            ProviderError::NotConfigured(format!("Failed to load model weights: {e}"))
        })?;

        let tokenizer = load_tokenizer(path, settings.tokenizer_repo.as_deref())?;

        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .or_else(|| tokenizer.token_to_id("<|im_end|>"))
            .or_else(|| tokenizer.token_to_id("<|eot_id|>"))
            .unwrap_or(2);

        let chat_template = ChatTemplate::detect(path);
        info!(eos_token_id, template = ?chat_template, "Local model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            chat_template,
            eos_token_id,
        })
    }

    /// Run inference: tokenize → generate tokens → decode.
    ///
    /// Returns `(text, prompt_tokens, completion_tokens)`.
    fn generate(
        &mut self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
        n_ctx: usize,
        stop: &[String],
    ) -> Result<(String, u32, u32), ProviderError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ProviderError::Inference(format!("Tokenization failed: {e}")))?;

        let (prompt_tokens, max_new) = fit_to_context(encoding.get_ids(), max_tokens, n_ctx);
        let prompt_token_count = prompt_tokens.len() as u32;

        debug!(
            prompt_tokens = prompt_token_count,
            max_tokens = max_new,
            temperature,
            "Starting local generation"
        );

        let mut next_input = Tensor::new(prompt_tokens, &self.device)
            .map_err(map_candle_err)?
            .unsqueeze(0)
            .map_err(map_candle_err)?;

        let mut logits_processor = if temperature <= 0.0 {
            LogitsProcessor::new(SEED, None, None)
        } else {
            LogitsProcessor::new(SEED, Some(temperature as f64), None)
        };

        let mut generated: Vec<u32> = Vec::new();
        let mut position = 0usize;
        let mut stopped_text: Option<String> = None;

        for _ in 0..max_new {
            let seq_len = next_input.dim(1).map_err(map_candle_err)?;
            let logits = self
                .model
                .forward(&next_input, position)
                .map_err(map_candle_err)?;
            // Position 0 resets the KV cache, so each request starts fresh
            position += seq_len;

            let logits = logits.squeeze(0).map_err(map_candle_err)?;
            let next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;

            if next_token == self.eos_token_id {
                break;
            }
            generated.push(next_token);

            if !stop.is_empty() {
                let text = self.decode(&generated)?;
                if let Some(cut) = cut_at_stop(&text, stop) {
                    stopped_text = Some(cut.to_string());
                    break;
                }
            }

            next_input = Tensor::new(&[next_token][..], &self.device)
                .map_err(map_candle_err)?
                .unsqueeze(0)
                .map_err(map_candle_err)?;
        }

        let completion_token_count = generated.len() as u32;
        let output = match stopped_text {
            Some(text) => text,
            None => self.decode(&generated)?,
        };

        debug!(
            completion_tokens = completion_token_count,
            output_len = output.len(),
            "Generation complete"
        );

        Ok((output, prompt_token_count, completion_token_count))
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, ProviderError> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| ProviderError::Inference(format!("Detokenization failed: {e}")))
    }
}

fn load_tokenizer(model_path: &Path, tokenizer_repo: Option<&str>) -> Result<Tokenizer, ProviderError> {
    let sibling = model_path.with_file_name("tokenizer.json");
    let tokenizer_path = if sibling.exists() {
        sibling
    } else {
        let repo = tokenizer_repo.ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "No tokenizer.json next to {} and no tokenizer repo configured",
                model_path.display()
            ))
        })?;
        warn!(repo, "No tokenizer.json next to GGUF file, downloading");
        let api = Api::new()
            .map_err(|e| ProviderError::Network(format!("HuggingFace Hub API error: {e}")))?;
        api.model(repo.to_string())
            .get("tokenizer.json")
            .map_err(|e| ProviderError::Network(format!("Failed to download tokenizer: {e}")))?
    };

    Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to load tokenizer: {e}")))
}

/// Keep the tail of the prompt so that prompt + completion fit in `n_ctx`.
///
/// Returns the (possibly shortened) prompt and the completion budget.
fn fit_to_context(tokens: &[u32], max_tokens: u32, n_ctx: usize) -> (&[u32], u32) {
    let max_new = (max_tokens as usize).min(n_ctx.saturating_sub(1)).max(1);
    let room = n_ctx.saturating_sub(max_new).max(1);
    let start = tokens.len().saturating_sub(room);
    (&tokens[start..], max_new as u32)
}

/// Text before the first stop sequence, if any stop sequence occurs.
fn cut_at_stop<'a>(text: &'a str, stop: &[String]) -> Option<&'a str> {
    stop.iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
        .map(|idx| &text[..idx])
}

fn format_tinyllama(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        let tag = match msg.role {
            Role::System => "<|system|>\n",
            Role::User => "<|user|>\n",
            Role::Assistant => "<|assistant|>\n",
        };
        prompt.push_str(tag);
        prompt.push_str(&msg.content);
        prompt.push_str("</s>\n");
    }
    prompt.push_str("<|assistant|>\n");
    prompt
}

fn format_chatml(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        prompt.push_str("<|im_start|>");
        prompt.push_str(msg.role.as_str());
        prompt.push('\n');
        prompt.push_str(&msg.content);
        prompt.push_str("<|im_end|>\n");
    }
    prompt.push_str("<|im_start|>assistant\n");
    prompt
}

fn format_llama2(messages: &[Message]) -> String {
    let mut prompt = String::new();
    let mut system_prompt = String::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                system_prompt = msg.content.clone();
            }
            Role::User => {
                prompt.push_str("[INST] ");
                if !system_prompt.is_empty() {
                    prompt.push_str("<<SYS>>\n");
                    prompt.push_str(&system_prompt);
                    prompt.push_str("\n<</SYS>>\n\n");
                    system_prompt.clear();
                }
                prompt.push_str(&msg.content);
                prompt.push_str(" [/INST]");
            }
            Role::Assistant => {
                prompt.push(' ');
                prompt.push_str(&msg.content);
                prompt.push_str(" </s>");
            }
        }
    }
    prompt
}

fn format_llama3(messages: &[Message]) -> String {
    let mut prompt = String::from("<|begin_of_text|>");
    for msg in messages {
        prompt.push_str("<|start_header_id|>");
        prompt.push_str(msg.role.as_str());
        prompt.push_str("<|end_header_id|>\n\n");
        prompt.push_str(&msg.content);
        prompt.push_str("<|eot_id|>");
    }
    prompt.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
    prompt
}

fn map_candle_err(e: candle_core::Error) -> ProviderError {
    ProviderError::Inference(format!("Candle inference error: {e}"))
}

// ── Provider trait implementation ──────────────────────────────────────

#[async_trait]
impl scholar_core::provider::Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn warm_up(&self) -> std::result::Result<(), ProviderError> {
        self.ensure_loaded().await
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.ensure_loaded().await?;

        let max_tokens = request.max_tokens.unwrap_or(512);
        let temperature = request.temperature;
        let n_ctx = self.settings.n_ctx;
        let ProviderRequest {
            model,
            messages,
            stop,
            ..
        } = request;

        // Candle is CPU-bound; keep it off the async workers
        let inner = self.inner.clone();
        let (output, prompt_tokens, completion_tokens) = tokio::task::spawn_blocking(move || {
            let mut guard = inner.blocking_lock();
            let state = guard
                .as_mut()
                .ok_or_else(|| ProviderError::Inference("model not loaded".into()))?;
            let prompt = state.chat_template.format(&messages);
            state.generate(&prompt, max_tokens, temperature, n_ctx, &stop)
        })
        .await
        .map_err(|e| ProviderError::Inference(format!("Inference task panicked: {e}")))??;

        let clean_output = output
            .trim()
            .trim_end_matches("</s>")
            .trim_end_matches("<|im_end|>")
            .trim_end_matches("<|eot_id|>")
            .trim()
            .to_string();

        let mut metadata = serde_json::Map::new();
        metadata.insert("engine".into(), serde_json::Value::String("candle".into()));

        Ok(ProviderResponse {
            message: Message::assistant(clean_output),
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            model: format!("local/{model}"),
            metadata,
        })
    }
}
