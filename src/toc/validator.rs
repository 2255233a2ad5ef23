//! Structural checks on an extracted TOC entry tree.
//!
//! The validator only reports. Every rule runs on every entry during one
//! depth-first walk and issues are accumulated, never short-circuited.
//!
//! | Code | Rule |
//! |------|------|
//! | V001 | page number decreased relative to the previous sibling |
//! | V002 | page number below 1 or beyond the document's page count |
//! | V003 | empty or whitespace-only title |
//! | V004 | title longer than `max_title_length` characters |
//! | V005 | child page number before its parent's |
//! | V006 | duplicate (title, page) pair anywhere in the tree |

use crate::config::TocValidationOptions;
use crate::error::TocValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// One extracted TOC entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    pub title: String,
    #[serde(default = "default_level")]
    pub level: u32,
    pub page_no: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

fn default_level() -> u32 {
    1
}

impl TocEntry {
    pub fn new(title: impl Into<String>, level: u32, page_no: i64) -> Self {
        Self {
            title: title.into(),
            level,
            page_no,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TocEntry>) -> Self {
        self.children = children;
        self
    }
}

/// Rule identifier attached to each issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    #[serde(rename = "V001")]
    PageOrder,
    #[serde(rename = "V002")]
    PageRange,
    #[serde(rename = "V003")]
    EmptyTitle,
    #[serde(rename = "V004")]
    TitleLength,
    #[serde(rename = "V005")]
    ChildBeforeParent,
    #[serde(rename = "V006")]
    Duplicate,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::PageOrder => "V001",
            IssueCode::PageRange => "V002",
            IssueCode::EmptyTitle => "V003",
            IssueCode::TitleLength => "V004",
            IssueCode::ChildBeforeParent => "V005",
            IssueCode::Duplicate => "V006",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact copy of the offending entry, without its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub title: String,
    pub level: u32,
    pub page_no: i64,
}

impl From<&TocEntry> for EntrySummary {
    fn from(e: &TocEntry) -> Self {
        Self {
            title: e.title.clone(),
            level: e.level,
            page_no: e.page_no,
        }
    }
}

impl fmt::Display for EntrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" (level {}, page {})",
            self.title, self.level, self.page_no
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    /// Position in the tree, e.g. `[0].children[1]`.
    pub path: String,
    pub entry: EntrySummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocValidationReport {
    pub valid: bool,
    pub error_count: usize,
    pub issues: Vec<ValidationIssue>,
}

impl TocValidationReport {
    /// Issues with the given code.
    pub fn with_code(&self, code: IssueCode) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TocValidator {
    options: TocValidationOptions,
}

impl TocValidator {
    pub fn new(options: TocValidationOptions) -> Self {
        Self { options }
    }

    pub fn validate(&self, entries: &[TocEntry]) -> TocValidationReport {
        let mut walk = Walk {
            options: &self.options,
            seen: HashMap::new(),
            issues: Vec::new(),
        };
        walk.siblings(entries, "", None);

        let error_count = walk.issues.len();
        debug!("TOC validation: {} entries checked, {} issue(s)", count_entries(entries), error_count);
        TocValidationReport {
            valid: error_count == 0,
            error_count,
            issues: walk.issues,
        }
    }

    /// Like [`validate`](Self::validate) but turns any issue into an error.
    ///
    /// # Errors
    /// [`TocValidationError`] carrying every issue when the tree is invalid.
    pub fn validate_or_err(
        &self,
        entries: &[TocEntry],
    ) -> Result<TocValidationReport, TocValidationError> {
        let report = self.validate(entries);
        if report.valid {
            Ok(report)
        } else {
            Err(TocValidationError {
                error_count: report.error_count,
                issues: report.issues,
            })
        }
    }
}

fn count_entries(entries: &[TocEntry]) -> usize {
    entries
        .iter()
        .map(|e| 1 + count_entries(&e.children))
        .sum()
}

/// Accumulator for one validation run.
struct Walk<'o, 'e> {
    options: &'o TocValidationOptions,
    /// (title, page) → path of the first occurrence.
    seen: HashMap<(&'e str, i64), String>,
    issues: Vec<ValidationIssue>,
}

impl<'o, 'e> Walk<'o, 'e> {
    fn siblings(&mut self, entries: &'e [TocEntry], prefix: &str, parent: Option<&'e TocEntry>) {
        let mut prev_page: Option<i64> = None;
        for (i, entry) in entries.iter().enumerate() {
            let path = if prefix.is_empty() {
                format!("[{i}]")
            } else {
                format!("{prefix}.children[{i}]")
            };

            if let Some(prev) = prev_page {
                if entry.page_no < prev {
                    self.push(
                        IssueCode::PageOrder,
                        format!("Page number decreased from {} to {}", prev, entry.page_no),
                        &path,
                        entry,
                    );
                }
            }
            prev_page = Some(entry.page_no);

            self.check_entry(entry, &path);

            if let Some(parent) = parent {
                if entry.page_no < parent.page_no {
                    self.push(
                        IssueCode::ChildBeforeParent,
                        format!(
                            "Child page {} is before parent page {} (\"{}\")",
                            entry.page_no, parent.page_no, parent.title
                        ),
                        &path,
                        entry,
                    );
                }
            }

            let key = (entry.title.as_str(), entry.page_no);
            match self.seen.get(&key).cloned() {
                Some(first) => {
                    let message = format!(
                        "Duplicate entry \"{}\" on page {} (first at {})",
                        entry.title, entry.page_no, first
                    );
                    self.push(IssueCode::Duplicate, message, &path, entry);
                }
                None => {
                    self.seen.insert(key, path.clone());
                }
            }

            self.siblings(&entry.children, &path, Some(entry));
        }
    }

    fn check_entry(&mut self, entry: &TocEntry, path: &str) {
        if entry.page_no < 1 {
            self.push(
                IssueCode::PageRange,
                format!("Page number {} must be >= 1", entry.page_no),
                path,
                entry,
            );
        } else if let Some(total) = self.options.total_pages {
            if entry.page_no > i64::from(total) {
                self.push(
                    IssueCode::PageRange,
                    format!(
                        "Page number {} exceeds document total pages ({})",
                        entry.page_no, total
                    ),
                    path,
                    entry,
                );
            }
        }

        if entry.title.trim().is_empty() {
            self.push(IssueCode::EmptyTitle, "Title is empty".to_string(), path, entry);
            return;
        }

        let len = entry.title.chars().count();
        if len > self.options.max_title_length {
            self.push(
                IssueCode::TitleLength,
                format!(
                    "Title length {} exceeds maximum {}",
                    len, self.options.max_title_length
                ),
                path,
                entry,
            );
        }
    }

    fn push(&mut self, code: IssueCode, message: String, path: &str, entry: &TocEntry) {
        self.issues.push(ValidationIssue {
            code,
            message,
            path: path.to_string(),
            entry: entry.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, page: i64) -> TocEntry {
        TocEntry::new(title, 1, page)
    }

    #[test]
    fn empty_title_reports_v003_only() {
        let report = TocValidator::default().validate(&[entry("", 1)]);
        assert!(!report.valid);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.issues[0].code, IssueCode::EmptyTitle);
        assert_eq!(report.issues[0].path, "[0]");
    }

    #[test]
    fn decreasing_sibling_pages() {
        let report = TocValidator::default().validate(&[entry("Ch1", 50), entry("Ch2", 30)]);
        assert_eq!(report.error_count, 1);
        let issue = &report.issues[0];
        assert_eq!(issue.code, IssueCode::PageOrder);
        assert_eq!(issue.path, "[1]");
        assert!(issue.message.contains("decreased from 50 to 30"));
    }

    #[test]
    fn equal_sibling_pages_are_fine() {
        let report = TocValidator::default().validate(&[entry("A", 5), entry("B", 5)]);
        assert!(report.valid);
    }

    #[test]
    fn page_range_bounds() {
        let v = TocValidator::new(TocValidationOptions::default().with_total_pages(100));
        let report = v.validate(&[entry("Zero", 0), entry("Far", 150)]);
        let codes: Vec<_> = report.issues.iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::PageRange, IssueCode::PageRange]);
        assert!(report.issues[0].message.contains("must be >= 1"));
        assert!(report.issues[1].message.contains("exceeds document total pages"));
    }

    #[test]
    fn upper_bound_skipped_without_total_pages() {
        assert!(TocValidator::default().validate(&[entry("Far", 9_999)]).valid);
    }

    #[test]
    fn long_title_reports_length() {
        let v = TocValidator::new(TocValidationOptions::default().with_max_title_length(10));
        let report = v.validate(&[entry("가나다라마바사아자차카", 1)]);
        assert_eq!(report.issues[0].code, IssueCode::TitleLength);
        assert!(report.issues[0].message.contains("11"));
    }

    #[test]
    fn child_before_parent() {
        let tree = [entry("Part I", 10).with_children(vec![entry("1.1", 8), entry("1.2", 12)])];
        let report = TocValidator::default().validate(&tree);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.issues[0].code, IssueCode::ChildBeforeParent);
        assert_eq!(report.issues[0].path, "[0].children[0]");
    }

    #[test]
    fn duplicates_flag_second_occurrence_only() {
        let tree = [
            entry("Intro", 1).with_children(vec![entry("Summary", 3)]),
            entry("Summary", 3),
            entry("Summary", 4),
            entry("Other", 4),
        ];
        let report = TocValidator::default().validate(&tree);
        let dups: Vec<_> = report.with_code(IssueCode::Duplicate).collect();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].path, "[1]");
    }

    #[test]
    fn issues_accumulate_across_rules() {
        let tree = [entry("A", 10), entry(" ", 5), entry("A", 10)];
        let report = TocValidator::default().validate(&tree);
        let codes: Vec<_> = report.issues.iter().map(|i| i.code).collect();
        assert_eq!(
            codes,
            vec![IssueCode::PageOrder, IssueCode::EmptyTitle, IssueCode::Duplicate]
        );
    }

    #[test]
    fn validate_or_err_embeds_every_issue() {
        let err = TocValidator::default()
            .validate_or_err(&[entry("Ch1", 50), entry("", 30)])
            .unwrap_err();
        let msg = err.to_string();
        assert_eq!(err.error_count, 2);
        assert!(msg.contains("[V001]"), "{msg}");
        assert!(msg.contains("[V003]"), "{msg}");
        assert!(msg.contains("path: [1]"), "{msg}");
        assert!(msg.contains("Total errors: 2"), "{msg}");
    }

    #[test]
    fn entries_deserialize_from_camel_case() {
        let entries: Vec<TocEntry> =
            serde_json::from_str(r#"[{"title":"Ch1","level":1,"pageNo":3,"children":[{"title":"1.1","pageNo":4}]}]"#)
                .unwrap();
        assert_eq!(entries[0].children[0].level, 1);
        assert!(TocValidator::default().validate(&entries).valid);
    }
}
