//! # edgequake-docstruct
//!
//! Structure recovery for parsed document trees (Docling-style JSON): find
//! the table of contents, check extracted TOC entries, and map every physical
//! page to the page number printed on it.
//!
//! ## Components
//!
//! ```text
//! Document JSON
//!  │
//!  ├─ RefResolver       $ref string → node, built once per document
//!  │
//!  ├─ TocFinder         keyword search → structural scoring → expansion
//!  │                    ──▶ TocLocation { item_refs, start_page, end_page }
//!  │
//!  ├─ TocValidator      V001–V006 checks on extracted TocEntry trees
//!  │
//!  └─ PageRangeParser   size groups → vision sampling → pattern → repair
//!                       ──▶ PageRangeOutput { page_range_map, usage }
//! ```
//!
//! The resolver, finder and validator are synchronous and pure. The parser
//! is async and talks to a model only through the [`VisionCaller`] trait;
//! [`LlmVisionCaller`] implements it on `edgequake-llm`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docstruct::{Document, PageRangeConfig, PageRangeParser, TocFinder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let doc = Document::from_path("report.json")?;
//!
//!     let toc = TocFinder::default().find(&doc)?;
//!     println!("TOC on pages {}-{}", toc.start_page, toc.end_page);
//!
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let parser = PageRangeParser::from_config(PageRangeConfig::default())?;
//!     let ranges = parser.parse(&doc).await?;
//!     println!("{} pages mapped", ranges.total_pages());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docstruct` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod page_range;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod resolver;
pub mod toc;
pub mod vision;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageRangeConfig, PageRangeConfigBuilder, TocFinderOptions, TocValidationOptions};
pub use document::Document;
pub use error::{
    DocStructError, ImageLoadError, PageRangeParseError, TocNotFoundError, TocValidationError,
    VisionError,
};
pub use output::{
    GroupReport, LlmUsage, ModelRole, PagePattern, PageRange, PageRangeMap, PageRangeOutput,
    TocLocation,
};
pub use page_range::PageRangeParser;
pub use pipeline::llm::LlmVisionCaller;
pub use progress::{NoopProgressCallback, PageRangeProgressCallback, ProgressCallback};
pub use resolver::{Node, RefResolver};
pub use toc::{
    render_toc_text, IssueCode, TocEntry, TocFinder, TocValidationReport, TocValidator,
    ValidationIssue,
};
pub use vision::{AbortSignal, PageImage, VisionCaller, VisionRequest, VisionResponse};
