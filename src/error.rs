//! Error types for the edgequake-docstruct library.
//!
//! Each top-level operation fails with exactly one typed error:
//!
//! * [`TocNotFoundError`] - [`crate::toc::TocFinder::find`] located no
//!   table of contents within the search budget.
//! * [`PageRangeParseError`] - [`crate::page_range::PageRangeParser::parse`]
//!   could not establish a page-number pattern, could not load a sampled
//!   page image, or the vision call failed / was cancelled.
//! * [`TocValidationError`] - aggregate of structural violations raised by
//!   [`crate::toc::TocValidator::validate_or_err`].
//!
//! Stage-internal heuristics never produce these; they return `None` and the
//! caller escalates to the next stage. [`DocStructError`] covers loading and
//! configuration, and wraps the three domain errors for callers that want a
//! single error type.

use crate::toc::validator::ValidationIssue;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for loading, configuration, and facade calls.
#[derive(Debug, Error)]
pub enum DocStructError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Document JSON file could not be read.
    #[error("Failed to read document '{path}': {source}")]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document JSON is malformed.
    #[error("Invalid document JSON: {0}")]
    InvalidDocument(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Domain errors ─────────────────────────────────────────────────────
    #[error(transparent)]
    TocNotFound(#[from] TocNotFoundError),

    #[error(transparent)]
    PageRange(#[from] PageRangeParseError),

    #[error(transparent)]
    TocValidation(#[from] TocValidationError),
}

/// No table of contents could be located.
#[derive(Debug, Clone, Error)]
#[error("Table of contents not found within the first {searched_pages} pages{}", keyword_hint(.keyword_hit))]
pub struct TocNotFoundError {
    /// Page budget that was searched.
    pub searched_pages: u32,
    /// Keyword text that matched but could not be tied to a container.
    pub keyword_hit: Option<String>,
}

fn keyword_hint(hit: &Option<String>) -> String {
    match hit {
        Some(text) => format!(" (keyword '{text}' matched but no TOC container was found)"),
        None => String::new(),
    }
}

/// Failure of the page-range parser.
#[derive(Debug, Error)]
pub enum PageRangeParseError {
    /// Every sampling attempt produced inconsistent page numbers.
    #[error(
        "No consistent page-number pattern for pages {first_page}-{last_page} after {attempts} attempts: {detail}"
    )]
    PatternNotDetected {
        first_page: u32,
        last_page: u32,
        attempts: u32,
        detail: String,
    },

    /// A page image required for sampling could not be loaded.
    #[error("Failed to load image for page {page}: {source}")]
    ImageLoad {
        page: u32,
        #[source]
        source: ImageLoadError,
    },

    /// The vision call itself failed (propagated as-is).
    #[error("Vision call failed: {0}")]
    Vision(#[from] VisionError),

    /// The abort signal fired before the next vision call.
    #[error("Page range parsing was cancelled")]
    Cancelled,
}

impl PageRangeParseError {
    /// `true` when the failure stems from cancellation rather than content.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PageRangeParseError::Cancelled | PageRangeParseError::Vision(VisionError::Cancelled)
        )
    }
}

/// Failure of a single vision-LLM call (after the caller's own retries).
#[derive(Debug, Clone, Error)]
pub enum VisionError {
    /// The abort signal fired; no further attempts were made.
    #[error("vision call cancelled")]
    Cancelled,

    /// Provider returned an error on every attempt.
    #[error("model '{model}' failed after {attempts} attempt(s): {message}")]
    Provider {
        model: String,
        attempts: u32,
        message: String,
    },

    /// The call exceeded the per-call timeout.
    #[error("model '{model}' timed out after {secs}s")]
    Timeout { model: String, secs: u64 },

    /// The model answered, but not with JSON matching the requested schema.
    #[error("model '{model}' returned invalid output: {detail}")]
    InvalidOutput { model: String, detail: String },
}

/// A page image could not be resolved or decoded.
#[derive(Debug, Clone, Error)]
pub enum ImageLoadError {
    #[error("page has no image locator")]
    MissingLocator,

    #[error("image file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    #[error("failed to read '{path}': {detail}")]
    ReadFailed { path: PathBuf, detail: String },

    #[error("failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("malformed data URI: {0}")]
    InvalidDataUri(String),

    #[error("image decoding failed: {0}")]
    Decode(String),
}

/// Aggregate of structural TOC violations.
///
/// The message lists every issue (code, message, path, entry) followed by
/// the total count, so callers can surface it without re-deriving anything.
#[derive(Debug, Clone, Error)]
#[error("{}", render_issues(.issues, .error_count))]
pub struct TocValidationError {
    pub error_count: usize,
    pub issues: Vec<ValidationIssue>,
}

fn render_issues(issues: &[ValidationIssue], error_count: &usize) -> String {
    let mut msg = format!("TOC validation failed with {error_count} error(s):");
    for issue in issues {
        msg.push_str(&format!(
            "\n  [{}] {} (path: {}, entry: {})",
            issue.code, issue.message, issue.path, issue.entry
        ));
    }
    msg.push_str(&format!("\nTotal errors: {error_count}"));
    msg
}
