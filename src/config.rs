//! Configuration types.
//!
//! The page-range parser is controlled through [`PageRangeConfig`], built via
//! [`PageRangeConfigBuilder`]. The two synchronous components take small
//! option structs, [`TocFinderOptions`] and [`TocValidationOptions`], with
//! chaining setters.

use crate::error::DocStructError;
use crate::progress::ProgressCallback;
use crate::vision::AbortSignal;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default vision model for page-number reading.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for [`crate::page_range::PageRangeParser`].
///
/// Built via [`PageRangeConfig::builder()`] or [`PageRangeConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docstruct::PageRangeConfig;
///
/// let config = PageRangeConfig::builder()
///     .model("gpt-4.1-mini")
///     .fallback_model("gpt-4.1")
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PageRangeConfig {
    /// Primary model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Model tried once the primary has exhausted its retries.
    pub fallback_model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens per vision answer. Default: 1024.
    pub max_tokens: usize,

    /// Retries per model on a failed vision call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Timeout for downloading `http(s)` page images. Default: 120.
    pub download_timeout_secs: u64,

    /// Pages sampled per attempt in a large group. Default: 3.
    pub sample_size: usize,

    /// Sampling attempts per large group. Default: 3.
    pub pattern_retries: u32,

    /// Groups up to this many pages are read in a single call. Default: 3.
    pub small_group_max_pages: usize,

    /// Size groups processed concurrently. Default: 4.
    pub concurrency: usize,

    /// Max width/height difference (points) for pages to share a group. Default: 0.5.
    pub size_tolerance: f64,

    /// Max spread between sampled offsets for an `Offset` pattern. Default: 1.
    pub offset_tolerance: i64,

    /// Printed numbers this far above the extrapolated value are outliers. Default: 10.
    pub outlier_threshold: i64,

    /// Successful pages required before backfill runs. Default: 2.
    pub min_backfill_context: usize,

    /// Larger page images are downscaled before upload. Default: 2000.
    pub max_image_dimension: u32,

    /// Checked before every vision call.
    pub abort: Option<AbortSignal>,

    /// Progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PageRangeConfig {
    fn default() -> Self {
        Self {
            model: None,
            fallback_model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            sample_size: 3,
            pattern_retries: 3,
            small_group_max_pages: 3,
            concurrency: 4,
            size_tolerance: 0.5,
            offset_tolerance: 1,
            outlier_threshold: 10,
            min_backfill_context: 2,
            max_image_dimension: 2000,
            abort: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PageRangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRangeConfig")
            .field("model", &self.model)
            .field("fallback_model", &self.fallback_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("sample_size", &self.sample_size)
            .field("pattern_retries", &self.pattern_retries)
            .field("small_group_max_pages", &self.small_group_max_pages)
            .field("concurrency", &self.concurrency)
            .field("size_tolerance", &self.size_tolerance)
            .field("offset_tolerance", &self.offset_tolerance)
            .field("outlier_threshold", &self.outlier_threshold)
            .field("min_backfill_context", &self.min_backfill_context)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("abort", &self.abort.is_some())
            .finish()
    }
}

impl PageRangeConfig {
    pub fn builder() -> PageRangeConfigBuilder {
        PageRangeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Primary model name, falling back to [`DEFAULT_MODEL`].
    pub fn primary_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PageRangeConfig`].
#[derive(Debug)]
pub struct PageRangeConfigBuilder {
    config: PageRangeConfig,
}

impl PageRangeConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.config.fallback_model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn sample_size(mut self, n: usize) -> Self {
        self.config.sample_size = n;
        self
    }

    pub fn pattern_retries(mut self, n: u32) -> Self {
        self.config.pattern_retries = n;
        self
    }

    pub fn small_group_max_pages(mut self, n: usize) -> Self {
        self.config.small_group_max_pages = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn size_tolerance(mut self, points: f64) -> Self {
        self.config.size_tolerance = points;
        self
    }

    pub fn offset_tolerance(mut self, n: i64) -> Self {
        self.config.offset_tolerance = n;
        self
    }

    pub fn outlier_threshold(mut self, n: i64) -> Self {
        self.config.outlier_threshold = n;
        self
    }

    pub fn min_backfill_context(mut self, n: usize) -> Self {
        self.config.min_backfill_context = n;
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(100);
        self
    }

    pub fn abort_signal(mut self, signal: AbortSignal) -> Self {
        self.config.abort = Some(signal);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PageRangeConfig, DocStructError> {
        let c = &self.config;
        if c.sample_size < 2 {
            return Err(DocStructError::InvalidConfig(format!(
                "sample_size must be >= 2, got {}",
                c.sample_size
            )));
        }
        if c.pattern_retries == 0 {
            return Err(DocStructError::InvalidConfig(
                "pattern_retries must be >= 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(DocStructError::InvalidConfig(
                "concurrency must be >= 1".into(),
            ));
        }
        if !c.size_tolerance.is_finite() || c.size_tolerance < 0.0 {
            return Err(DocStructError::InvalidConfig(format!(
                "size_tolerance must be a non-negative number, got {}",
                c.size_tolerance
            )));
        }
        if c.offset_tolerance < 0 || c.outlier_threshold < 0 {
            return Err(DocStructError::InvalidConfig(
                "offset_tolerance and outlier_threshold must be >= 0".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Locator / validator options ──────────────────────────────────────────

/// Options for [`crate::toc::TocFinder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TocFinderOptions {
    /// Only pages up to this number are searched for the initial hit. Default: 10.
    pub max_search_pages: u32,
    /// Extra heading keywords on top of the built-in set.
    pub additional_keywords: Vec<String>,
}

impl Default for TocFinderOptions {
    fn default() -> Self {
        Self {
            max_search_pages: 10,
            additional_keywords: Vec::new(),
        }
    }
}

impl TocFinderOptions {
    pub fn with_max_search_pages(mut self, pages: u32) -> Self {
        self.max_search_pages = pages;
        self
    }

    pub fn with_additional_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

/// Options for [`crate::toc::TocValidator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TocValidationOptions {
    /// Upper bound for page numbers; the check is skipped when `None`.
    pub total_pages: Option<u32>,
    /// Default: 200.
    pub max_title_length: usize,
}

impl Default for TocValidationOptions {
    fn default() -> Self {
        Self {
            total_pages: None,
            max_title_length: 200,
        }
    }
}

impl TocValidationOptions {
    pub fn with_total_pages(mut self, pages: u32) -> Self {
        self.total_pages = Some(pages);
        self
    }

    pub fn with_max_title_length(mut self, len: usize) -> Self {
        self.max_title_length = len;
        self
    }
}
