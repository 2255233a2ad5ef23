//! Progress-callback trait for page-range parsing events.
//!
//! Inject an [`Arc<dyn PageRangeProgressCallback>`] via
//! [`crate::config::PageRangeConfigBuilder::progress_callback`] to receive
//! events as the parser works through each size group.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docstruct::{PageRangeConfig, PageRangeProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     groups: AtomicUsize,
//! }
//!
//! impl PageRangeProgressCallback for CountingCallback {
//!     fn on_group_complete(&self, first_page: u32, last_page: u32, vision_calls: u32) {
//!         self.groups.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("pages {first_page}-{last_page} done in {vision_calls} call(s)");
//!     }
//! }
//!
//! let config = PageRangeConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { groups: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the page-range parser as it processes each size group.
///
/// Groups run concurrently, so `on_group_*` may be called from several
/// tasks at once. All methods default to no-ops.
pub trait PageRangeProgressCallback: Send + Sync {
    /// Called once after grouping, before any vision call.
    ///
    /// # Arguments
    /// * `total_pages` - physical pages in the document
    /// * `group_count` - number of consecutive same-size groups
    fn on_parse_start(&self, total_pages: usize, group_count: usize) {
        let _ = (total_pages, group_count);
    }

    /// Called before the first vision call of a group.
    fn on_group_start(&self, first_page: u32, last_page: u32) {
        let _ = (first_page, last_page);
    }

    /// Called when a group has been resolved (including the `Unknown`
    /// fallback).
    ///
    /// # Arguments
    /// * `vision_calls` - calls spent on this group
    fn on_group_complete(&self, first_page: u32, last_page: u32, vision_calls: u32) {
        let _ = (first_page, last_page, vision_calls);
    }

    /// Called when a group fails; the parse as a whole fails with it.
    fn on_group_error(&self, first_page: u32, last_page: u32, error: &str) {
        let _ = (first_page, last_page, error);
    }

    /// Called once after post-processing.
    ///
    /// # Arguments
    /// * `failed_pages` - pages still carrying the `0` sentinel
    fn on_parse_complete(&self, total_pages: usize, failed_pages: usize) {
        let _ = (total_pages, failed_pages);
    }
}

/// Default when no callback is configured.
pub struct NoopProgressCallback;

impl PageRangeProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::PageRangeConfig`].
pub type ProgressCallback = Arc<dyn PageRangeProgressCallback>;
