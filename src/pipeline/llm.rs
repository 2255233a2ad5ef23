//! Vision calls through `edgequake-llm`.
//!
//! [`LlmVisionCaller`] implements [`VisionCaller`] on top of
//! `Arc<dyn LLMProvider>`: one provider per configured model name, each call
//! retried with exponential backoff (`retry_backoff_ms * 2^(attempt-1)`),
//! bounded by a per-call timeout, then handed to the fallback model once the
//! primary is exhausted.
//!
//! Prompt text lives in [`crate::prompts`]; this module only deals with
//! transport, retries and turning the model's text into JSON.

use crate::config::{PageRangeConfig, DEFAULT_MODEL};
use crate::error::{DocStructError, VisionError};
use crate::output::{LlmUsage, ModelRole};
use crate::prompts::schema_instruction;
use crate::vision::{AbortSignal, PageImage, VisionCaller, VisionRequest, VisionResponse};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// [`VisionCaller`] backed by one or two `edgequake-llm` providers.
pub struct LlmVisionCaller {
    models: HashMap<String, Arc<dyn LLMProvider>>,
    temperature: f32,
    max_tokens: usize,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmVisionCaller {
    /// Caller with a single model. Sampling knobs come from `config`.
    pub fn new(
        model: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
        config: &PageRangeConfig,
    ) -> Self {
        let mut models = HashMap::new();
        models.insert(model.into(), provider);
        Self {
            models,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Register the provider used when a request names `model` as fallback.
    pub fn with_fallback(mut self, model: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        self.models.insert(model.into(), provider);
        self
    }

    /// Build a caller from the config's provider settings.
    ///
    /// The primary provider is resolved by [`resolve_provider`]. A fallback
    /// provider is created for `fallback_model` using the same provider name.
    pub fn from_config(config: &PageRangeConfig) -> Result<Self, DocStructError> {
        let primary = resolve_provider(config)?;
        let mut caller = Self::new(config.primary_model(), primary, config);

        if let Some(ref fallback) = config.fallback_model {
            let name = fallback_provider_name(config);
            info!("Fallback model: {} via {}", fallback, name);
            caller = caller.with_fallback(fallback.clone(), create_vision_provider(&name, fallback)?);
        }
        Ok(caller)
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    /// Run `model` with retries. Only cancellation short-circuits the loop.
    async fn call_model(
        &self,
        model: &str,
        role: ModelRole,
        messages: &[ChatMessage],
        request: &VisionRequest,
    ) -> Result<VisionResponse, VisionError> {
        let provider = self.models.get(model).ok_or_else(|| VisionError::Provider {
            model: model.to_string(),
            attempts: 0,
            message: "model is not configured on this caller".to_string(),
        })?;
        let options = self.options();
        let mut last_err: Option<VisionError> = None;

        for attempt in 0..=request.max_retries {
            if request.is_aborted() {
                return Err(VisionError::Cancelled);
            }
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    model, attempt, request.max_retries, backoff
                );
                let pause = sleep(Duration::from_millis(backoff));
                until_aborted(pause, request.abort.as_ref()).await?;
            }

            let call = timeout(
                Duration::from_secs(self.api_timeout_secs),
                provider.chat(messages, Some(&options)),
            );
            let outcome = until_aborted(call, request.abort.as_ref())
                .await
                .inspect_err(|_| warn!("{}: attempt {} cancelled in flight", model, attempt + 1))?;
            match outcome {
                Err(_) => {
                    warn!("{}: attempt {} timed out", model, attempt + 1);
                    last_err = Some(VisionError::Timeout {
                        model: model.to_string(),
                        secs: self.api_timeout_secs,
                    });
                }
                Ok(Err(e)) => {
                    warn!("{}: attempt {} failed: {}", model, attempt + 1, e);
                    last_err = Some(VisionError::Provider {
                        model: model.to_string(),
                        attempts: attempt + 1,
                        message: e.to_string(),
                    });
                }
                Ok(Ok(response)) => match extract_json(&response.content) {
                    Some(output) => {
                        debug!(
                            "{}: {} input tokens, {} output tokens",
                            model, response.prompt_tokens, response.completion_tokens
                        );
                        let input_tokens = response.prompt_tokens as u64;
                        let output_tokens = response.completion_tokens as u64;
                        return Ok(VisionResponse {
                            output,
                            usage: LlmUsage {
                                component: request.component.clone(),
                                phase: request.phase.clone(),
                                model: role,
                                model_name: model.to_string(),
                                input_tokens,
                                output_tokens,
                                total_tokens: input_tokens + output_tokens,
                            },
                            used_fallback: role == ModelRole::Fallback,
                        });
                    }
                    None => {
                        warn!("{}: attempt {} returned non-JSON output", model, attempt + 1);
                        last_err = Some(VisionError::InvalidOutput {
                            model: model.to_string(),
                            detail: truncate(&response.content, 200),
                        });
                    }
                },
            }
        }

        Err(last_err.unwrap_or_else(|| VisionError::Provider {
            model: model.to_string(),
            attempts: request.max_retries + 1,
            message: "Unknown error".to_string(),
        }))
    }
}

#[async_trait]
impl VisionCaller for LlmVisionCaller {
    async fn call(&self, request: VisionRequest) -> Result<VisionResponse, VisionError> {
        let messages = build_messages(&request);

        let primary_err = match self
            .call_model(&request.primary_model, ModelRole::Primary, &messages, &request)
            .await
        {
            Ok(response) => return Ok(response),
            Err(VisionError::Cancelled) => return Err(VisionError::Cancelled),
            Err(e) => e,
        };

        match request.fallback_model.as_deref() {
            Some(fallback) => {
                warn!(
                    "{} exhausted ({}); switching to fallback {}",
                    request.primary_model, primary_err, fallback
                );
                self.call_model(fallback, ModelRole::Fallback, &messages, &request)
                    .await
            }
            None => Err(primary_err),
        }
    }
}

/// Run `fut` to completion unless `abort` fires first.
async fn until_aborted<F: Future>(
    fut: F,
    abort: Option<&AbortSignal>,
) -> Result<F::Output, VisionError> {
    let Some(signal) = abort else {
        return Ok(fut.await);
    };
    tokio::select! {
        out = fut => Ok(out),
        _ = signal.cancelled() => Err(VisionError::Cancelled),
    }
}

/// System message (prompt + schema instruction), then one user message
/// carrying the images and the text prompt.
fn build_messages(request: &VisionRequest) -> Vec<ChatMessage> {
    let system = format!(
        "{}{}",
        request.system_prompt,
        schema_instruction(&request.schema)
    );
    let images: Vec<ImageData> = request.images.iter().map(to_image_data).collect();
    vec![
        ChatMessage::system(system),
        ChatMessage::user_with_images(request.prompt.as_str(), images),
    ]
}

fn to_image_data(image: &PageImage) -> ImageData {
    ImageData::new(image.data.clone(), image.mime_type.as_str()).with_detail("high")
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n?(.*?)\n?\s*```$").unwrap());

/// Parse the model's text as JSON, tolerating code fences and prose around
/// a single top-level object.
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    let unfenced = RE_JSON_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed);

    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Some(value);
    }

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&unfenced[start..=end]).ok()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocStructError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocStructError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Provider name used to build the fallback model's provider.
fn fallback_provider_name(config: &PageRangeConfig) -> String {
    if let Some(ref name) = config.provider_name {
        return name.clone();
    }
    match std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        Ok(name) if !name.is_empty() => name,
        _ => "openai".to_string(),
    }
}

/// Resolve the primary LLM provider, from most-specific to least-specific:
///
/// 1. pre-built `config.provider`
/// 2. `config.provider_name` + primary model
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`
/// 4. `OPENAI_API_KEY` → OpenAI with the primary model
/// 5. `ProviderFactory::from_env`
pub fn resolve_provider(config: &PageRangeConfig) -> Result<Arc<dyn LLMProvider>, DocStructError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.primary_model());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocStructError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
