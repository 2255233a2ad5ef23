//! The vision-call seam used by the page-range parser.
//!
//! [`VisionCaller`] is the only way the parser talks to a model. The
//! production implementation is [`crate::pipeline::llm::LlmVisionCaller`];
//! tests plug in scripted callers.

use crate::error::VisionError;
use crate::output::LlmUsage;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative cancellation flag shared between a host and the parser.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Resolves once the signal has fired. Polls the flag every
    /// [`ABORT_POLL_INTERVAL`].
    pub async fn cancelled(&self) {
        while !self.is_aborted() {
            tokio::time::sleep(ABORT_POLL_INTERVAL).await;
        }
    }
}

/// How often [`AbortSignal::cancelled`] re-checks the flag.
pub const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A base64 page image ready to attach to a vision request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Base64 payload without the `data:` prefix.
    pub data: String,
    pub mime_type: String,
}

impl PageImage {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// One structured vision call.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// JSON schema the answer must follow.
    pub schema: Value,
    pub system_prompt: String,
    /// Text part of the user message, sent after the images.
    pub prompt: String,
    pub images: Vec<PageImage>,
    pub primary_model: String,
    pub fallback_model: Option<String>,
    pub max_retries: u32,
    pub abort: Option<AbortSignal>,
    /// Usage attribution, e.g. `"page-range-parser"`.
    pub component: String,
    /// Usage attribution, e.g. `"pattern-sampling"`.
    pub phase: String,
}

impl VisionRequest {
    pub fn is_aborted(&self) -> bool {
        self.abort.as_ref().is_some_and(AbortSignal::is_aborted)
    }
}

/// Parsed answer of a vision call.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionResponse {
    pub output: Value,
    pub usage: LlmUsage,
    pub used_fallback: bool,
}

/// Structured vision-LLM call.
///
/// Implementations own their retry policy (`max_retries`, fallback model).
/// Callers never retry a failed call themselves.
#[async_trait]
pub trait VisionCaller: Send + Sync {
    async fn call(&self, request: VisionRequest) -> Result<VisionResponse, VisionError>;
}
