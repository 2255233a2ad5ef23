//! Table-of-contents location and validation.

pub mod finder;
pub mod patterns;
pub mod render;
pub mod validator;

pub use finder::TocFinder;
pub use render::render_toc_text;
pub use validator::{
    EntrySummary, IssueCode, TocEntry, TocValidationReport, TocValidator, ValidationIssue,
};
