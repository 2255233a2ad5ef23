//! Page-range parsing: which printed page numbers each physical page shows.
//!
//! * [`grouping`] - consecutive same-size page runs
//! * [`pattern`] - sampling, answer parsing, pattern classification
//! * [`postprocess`] - ordered repair passes over the merged map
//! * [`parser`] - the async driver tying them to a [`crate::vision::VisionCaller`]

pub mod grouping;
pub mod parser;
pub mod pattern;
pub mod postprocess;

pub use parser::PageRangeParser;
pub use postprocess::{postprocess, PostprocessOptions};
