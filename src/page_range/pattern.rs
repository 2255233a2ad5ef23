//! Page-number pattern detection for large size groups.
//!
//! A handful of pages is sampled, read by the vision model, and the readings
//! are classified into a [`PagePattern`]. Each attempt ends in one of three
//! explicit states:
//!
//! ```text
//!            ┌─ every sample read, one pattern fits ──▶ Complete(pattern)
//! readings ──┼─ some sample unreadable (null) ───────▶ Partial
//!            └─ all read, no pattern fits ───────────▶ Inconsistent(detail)
//! ```

use crate::output::{PagePattern, PageRange};
use serde_json::Value;
use std::collections::HashMap;

/// Result of one sampling attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleOutcome {
    Complete(PagePattern),
    Partial,
    Inconsistent(String),
}

/// Sample position inside each segment, varied per attempt.
const SAMPLE_POSITIONS: [(usize, usize); 3] = [(1, 2), (1, 4), (3, 4)];

/// Indices (into a group of `len` pages) to sample on `attempt`.
///
/// The group is cut into `min(sample_size, len)` equal segments and one
/// page is taken per segment, at the middle on the first attempt and at the
/// quarter points on later ones. Indices are distinct and ascending.
pub fn sample_indices(len: usize, sample_size: usize, attempt: u32) -> Vec<usize> {
    let n = sample_size.min(len);
    if n == 0 {
        return Vec::new();
    }
    let (num, den) = SAMPLE_POSITIONS[attempt as usize % SAMPLE_POSITIONS.len()];
    (0..n).map(|i| ((i * den + num) * len) / (n * den)).collect()
}

/// Readings from a page-number answer, one slot per attached image.
///
/// A slot is `None` when the model returned `null`, omitted the image, or
/// sent something that is not an integer.
pub fn parse_readings(output: &Value, image_count: usize) -> Vec<Option<PageRange>> {
    let mut readings = vec![None; image_count];
    let Some(pages) = output.get("pages").and_then(Value::as_array) else {
        return readings;
    };

    for page in pages {
        let Some(index) = page.get("imageIndex").and_then(Value::as_u64) else {
            continue;
        };
        let index = index as usize;
        if index >= image_count {
            continue;
        }
        let start = page.get("startPageNo").and_then(Value::as_i64);
        let end = page.get("endPageNo").and_then(Value::as_i64);
        readings[index] = match (start, end) {
            (Some(start), Some(end)) => Some(PageRange {
                start_page_no: start,
                end_page_no: end,
            }),
            (Some(start), None) => Some(PageRange::single(start)),
            (None, _) => None,
        };
    }
    readings
}

/// Classify sampled readings. `samples` pairs the physical page number with
/// the reading of that page.
pub fn classify(samples: &[(u32, Option<PageRange>)], offset_tolerance: i64) -> SampleOutcome {
    let mut read: Vec<(i64, PageRange)> = Vec::with_capacity(samples.len());
    for (page, reading) in samples {
        match reading {
            Some(r) => read.push((i64::from(*page), *r)),
            None => return SampleOutcome::Partial,
        }
    }
    if read.is_empty() {
        return SampleOutcome::Partial;
    }

    let doubles = read.iter().filter(|(_, r)| r.is_double_sided()).count();
    if doubles == read.len() {
        let offsets: Vec<i64> = read.iter().map(|(p, r)| r.start_page_no - 2 * p).collect();
        return match consistent_offset(&offsets, offset_tolerance) {
            Some(offset) => SampleOutcome::Complete(PagePattern::DoubleSided { offset }),
            None => SampleOutcome::Inconsistent(format!("double-sided offsets {offsets:?}")),
        };
    }
    if doubles > 0 {
        return SampleOutcome::Inconsistent(format!(
            "{doubles} of {} samples are spreads",
            read.len()
        ));
    }

    if read.iter().all(|(p, r)| r.start_page_no == *p) {
        return SampleOutcome::Complete(PagePattern::SimpleIncrement);
    }

    let offsets: Vec<i64> = read.iter().map(|(p, r)| r.start_page_no - p).collect();
    match consistent_offset(&offsets, offset_tolerance) {
        Some(0) => SampleOutcome::Complete(PagePattern::SimpleIncrement),
        Some(offset) => SampleOutcome::Complete(PagePattern::Offset { offset }),
        None => SampleOutcome::Inconsistent(format!("offsets {offsets:?}")),
    }
}

/// Most frequent offset (smallest on ties) when all offsets lie within
/// `tolerance` of each other.
fn consistent_offset(offsets: &[i64], tolerance: i64) -> Option<i64> {
    let min = *offsets.iter().min()?;
    let max = *offsets.iter().max()?;
    if max - min > tolerance {
        return None;
    }
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for o in offsets {
        *counts.entry(*o).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_off, a_n), (b_off, b_n)| a_n.cmp(b_n).then(b_off.cmp(a_off)))
        .map(|(offset, _)| offset)
}

/// Printed range of physical page `page` under `pattern`.
pub fn apply_pattern(pattern: PagePattern, page: u32) -> PageRange {
    let p = i64::from(page);
    match pattern {
        PagePattern::SimpleIncrement => PageRange::single(p),
        PagePattern::Offset { offset } => PageRange::single(p + offset),
        PagePattern::DoubleSided { offset } => PageRange::spread(2 * p + offset),
        PagePattern::Unknown => PageRange::FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sample_indices_are_spread_and_distinct() {
        assert_eq!(sample_indices(9, 3, 0), vec![1, 4, 7]);
        assert_eq!(sample_indices(9, 3, 1), vec![0, 3, 6]);
        assert_eq!(sample_indices(9, 3, 2), vec![2, 5, 8]);
        assert_eq!(sample_indices(2, 3, 0), vec![0, 1]);
        for attempt in 0..5 {
            let idx = sample_indices(4, 3, attempt);
            assert!(idx.windows(2).all(|w| w[0] < w[1]), "{idx:?}");
            assert!(idx.iter().all(|&i| i < 4));
        }
    }

    #[test]
    fn readings_handle_nulls_and_missing_images() {
        let out = json!({"pages": [
            {"imageIndex": 0, "startPageNo": 5, "endPageNo": 5},
            {"imageIndex": 2, "startPageNo": null, "endPageNo": null},
            {"imageIndex": 7, "startPageNo": 1, "endPageNo": 1}
        ]});
        let r = parse_readings(&out, 3);
        assert_eq!(r, vec![Some(PageRange::single(5)), None, None]);
    }

    #[test]
    fn readings_without_pages_are_all_empty() {
        assert_eq!(parse_readings(&json!({"oops": 1}), 2), vec![None, None]);
    }

    #[test]
    fn classify_simple_increment() {
        let s = [(4, Some(PageRange::single(4))), (8, Some(PageRange::single(8)))];
        assert_eq!(classify(&s, 1), SampleOutcome::Complete(PagePattern::SimpleIncrement));
    }

    #[test]
    fn classify_offset_with_tolerance() {
        let s = [
            (2, Some(PageRange::single(7))),
            (5, Some(PageRange::single(10))),
            (7, Some(PageRange::single(13))),
        ];
        assert_eq!(
            classify(&s, 1),
            SampleOutcome::Complete(PagePattern::Offset { offset: 5 })
        );
    }

    #[test]
    fn classify_double_sided() {
        let s = [(3, Some(PageRange::spread(5))), (6, Some(PageRange::spread(11)))];
        assert_eq!(
            classify(&s, 1),
            SampleOutcome::Complete(PagePattern::DoubleSided { offset: -1 })
        );
    }

    #[test]
    fn classify_partial_and_inconsistent() {
        let partial = [(1, Some(PageRange::single(1))), (2, None)];
        assert_eq!(classify(&partial, 1), SampleOutcome::Partial);

        let wild = [(1, Some(PageRange::single(1))), (5, Some(PageRange::single(40)))];
        assert!(matches!(classify(&wild, 1), SampleOutcome::Inconsistent(_)));

        let mixed = [(1, Some(PageRange::single(1))), (5, Some(PageRange::spread(9)))];
        assert!(matches!(classify(&mixed, 1), SampleOutcome::Inconsistent(_)));
    }

    #[test]
    fn apply_each_pattern() {
        assert_eq!(apply_pattern(PagePattern::SimpleIncrement, 3), PageRange::single(3));
        assert_eq!(apply_pattern(PagePattern::Offset { offset: 5 }, 1), PageRange::single(6));
        assert_eq!(apply_pattern(PagePattern::Offset { offset: 5 }, 8), PageRange::single(13));
        assert_eq!(apply_pattern(PagePattern::DoubleSided { offset: -1 }, 3), PageRange::spread(5));
        assert_eq!(apply_pattern(PagePattern::Unknown, 3), PageRange::FAILED);
    }
}
