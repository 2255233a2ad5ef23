//! Result types returned by the locator and the page-range parser.
//!
//! Everything here is `Serialize` so the CLI (and any host service) can emit
//! results as JSON without a parallel DTO layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the table of contents lives in the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocLocation {
    /// Container refs, backward expansion first, then the original find,
    /// then forward expansion. No ref repeats.
    pub item_refs: Vec<String>,
    pub start_page: u32,
    pub end_page: u32,
}

impl TocLocation {
    /// Number of physical pages the TOC spans.
    pub fn page_span(&self) -> u32 {
        self.end_page.saturating_sub(self.start_page) + 1
    }

    pub fn contains_page(&self, page: u32) -> bool {
        (self.start_page..=self.end_page).contains(&page)
    }
}

/// Sentinel for a printed page number that could not be determined.
pub const FAILED_PAGE_NO: i64 = 0;

/// Printed page numbers on one physical page.
///
/// `start == end` is a single-sided page, `end == start + 1` a two-page
/// spread. `0` marks failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRange {
    pub start_page_no: i64,
    pub end_page_no: i64,
}

impl PageRange {
    pub const FAILED: PageRange = PageRange {
        start_page_no: FAILED_PAGE_NO,
        end_page_no: FAILED_PAGE_NO,
    };

    pub fn single(page_no: i64) -> Self {
        Self {
            start_page_no: page_no,
            end_page_no: page_no,
        }
    }

    pub fn spread(start_page_no: i64) -> Self {
        Self {
            start_page_no,
            end_page_no: start_page_no + 1,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.start_page_no == FAILED_PAGE_NO
    }

    pub fn is_double_sided(&self) -> bool {
        self.end_page_no == self.start_page_no + 1
    }
}

/// Physical page number (1-based) → printed page range.
pub type PageRangeMap = BTreeMap<u32, PageRange>;

/// Which model of the primary/fallback pair answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    #[default]
    Primary,
    Fallback,
}

/// Token usage of one vision-LLM call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmUsage {
    pub component: String,
    pub phase: String,
    pub model: ModelRole,
    pub model_name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl LlmUsage {
    /// Placeholder record for runs that made no call at all.
    pub fn zero(component: impl Into<String>, phase: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            phase: phase.into(),
            ..Default::default()
        }
    }
}

/// Page-number pattern detected for one size group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum PagePattern {
    /// printed == physical
    SimpleIncrement,
    /// printed == physical + offset
    Offset { offset: i64 },
    /// printed start == 2 × physical + offset, end == start + 1
    DoubleSided { offset: i64 },
    /// nothing consistent; every page gets the sentinel
    Unknown,
}

/// How one size group was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReport {
    pub first_page: u32,
    pub last_page: u32,
    /// `None` for groups resolved directly by the small-group fast path.
    pub pattern: Option<PagePattern>,
    pub attempts: u32,
}

/// Output of [`crate::page_range::PageRangeParser::parse`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRangeOutput {
    pub page_range_map: PageRangeMap,
    pub usage: Vec<LlmUsage>,
    #[serde(default)]
    pub groups: Vec<GroupReport>,
}

impl PageRangeOutput {
    /// Total pages as surfaced to the end user.
    pub fn total_pages(&self) -> usize {
        self.page_range_map.len()
    }

    pub fn failed_pages(&self) -> Vec<u32> {
        self.page_range_map
            .iter()
            .filter(|(_, r)| r.is_failed())
            .map(|(p, _)| *p)
            .collect()
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.usage.iter().map(|u| u.input_tokens).sum()
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.usage.iter().map(|u| u.output_tokens).sum()
    }
}
