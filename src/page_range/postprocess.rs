//! Post-processing: deterministic repair of the merged page-range map.
//!
//! Vision answers are read page by page (or extrapolated per group), so the
//! merged map can hold negative numbers, isolated misreads, restarts of the
//! numbering, and pages nobody could read. Four passes fix that without
//! another model call. Each pass is a pure function
//! `PageRangeMap -> PageRangeMap`.
//!
//! ## Pass order
//!
//! 1. Negative normalisation
//! 2. Outlier detection
//! 3. Drop detection
//! 4. Backfill
//!
//! Outliers must be gone before drops are looked for, otherwise a misread
//! `100` followed by `10` would re-anchor every earlier page. Backfill runs
//! last so it extrapolates only from values that survived the other passes.

use crate::output::{PageRange, PageRangeMap};
use tracing::debug;

/// Knobs of the post-processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostprocessOptions {
    /// Pages printed more than this above the extrapolated value are reset.
    pub outlier_threshold: i64,
    /// Backfill is skipped with fewer successful pages than this.
    pub min_backfill_context: usize,
}

impl Default for PostprocessOptions {
    fn default() -> Self {
        Self {
            outlier_threshold: 10,
            min_backfill_context: 2,
        }
    }
}

/// Length of the run that anchors outlier detection.
const ANCHOR_RUN: usize = 3;

/// Apply all passes in order.
pub fn postprocess(map: PageRangeMap, options: &PostprocessOptions) -> PageRangeMap {
    let map = normalize_negative(map);
    let map = detect_outliers(map, options.outlier_threshold);
    let map = detect_drops(map);
    backfill(map, options.min_backfill_context)
}

/// Printed start of physical page `page` under the pattern of `anchor`.
fn extrapolate(anchor_page: u32, anchor: PageRange, page: u32) -> PageRange {
    let distance = i64::from(anchor_page) - i64::from(page);
    if anchor.is_double_sided() {
        PageRange::spread(anchor.start_page_no - 2 * distance)
    } else {
        PageRange::single(anchor.start_page_no - distance)
    }
}

// ── Pass 1: Negative normalisation ───────────────────────────────────────────

fn normalize_negative(mut map: PageRangeMap) -> PageRangeMap {
    let mut reset = 0;
    for range in map.values_mut() {
        if range.start_page_no < 0 || range.end_page_no < 0 {
            *range = PageRange::FAILED;
            reset += 1;
        }
    }
    if reset > 0 {
        debug!("Negative normalisation reset {} page(s)", reset);
    }
    map
}

// ── Pass 2: Outlier detection ────────────────────────────────────────────────

/// First physical page of a run of [`ANCHOR_RUN`] consecutive, successful
/// pages whose printed starts advance by a constant step of 1 or 2.
fn find_anchor(map: &PageRangeMap) -> Option<(u32, i64)> {
    let pages: Vec<(u32, PageRange)> = map.iter().map(|(p, r)| (*p, *r)).collect();
    pages.windows(ANCHOR_RUN).find_map(|w| {
        let consecutive = w.windows(2).all(|pair| pair[1].0 == pair[0].0 + 1);
        if !consecutive || w.iter().any(|(_, r)| r.is_failed()) {
            return None;
        }
        let step = w[1].1.start_page_no - w[0].1.start_page_no;
        let steady = w
            .windows(2)
            .all(|pair| pair[1].1.start_page_no - pair[0].1.start_page_no == step);
        (steady && (step == 1 || step == 2)).then_some((w[0].0, step))
    })
}

fn detect_outliers(mut map: PageRangeMap, threshold: i64) -> PageRangeMap {
    let Some((anchor_page, step)) = find_anchor(&map) else {
        return map;
    };
    let anchor_start = map[&anchor_page].start_page_no;

    let mut reset = Vec::new();
    for (page, range) in map.range_mut(..anchor_page) {
        if range.is_failed() {
            continue;
        }
        let expected = anchor_start - step * (i64::from(anchor_page) - i64::from(*page));
        if range.start_page_no > expected + threshold {
            *range = PageRange::FAILED;
            reset.push(*page);
        }
    }
    if !reset.is_empty() {
        debug!(
            "Outlier detection (anchor page {}, step {}) reset pages {:?}",
            anchor_page, step, reset
        );
    }
    map
}

// ── Pass 3: Drop detection ───────────────────────────────────────────────────

fn detect_drops(mut map: PageRangeMap) -> PageRangeMap {
    let pages: Vec<u32> = map.keys().copied().collect();
    let mut last: Option<PageRange> = None;

    for page in pages {
        let current = map[&page];
        if current.is_failed() {
            continue;
        }
        if let Some(prev) = last {
            if prev.start_page_no - current.start_page_no > 1 {
                debug!(
                    "Drop on page {}: {} after {}; re-anchoring earlier pages",
                    page, current.start_page_no, prev.start_page_no
                );
                for (earlier, range) in map.range_mut(..page) {
                    let recomputed = extrapolate(page, current, *earlier);
                    *range = if recomputed.start_page_no <= 0 {
                        PageRange::FAILED
                    } else {
                        recomputed
                    };
                }
            }
        }
        last = Some(current);
    }
    map
}

// ── Pass 4: Backfill ─────────────────────────────────────────────────────────

fn backfill(mut map: PageRangeMap, min_context: usize) -> PageRangeMap {
    let snapshot: Vec<(u32, PageRange)> = map
        .iter()
        .filter(|(_, r)| !r.is_failed())
        .map(|(p, r)| (*p, *r))
        .collect();
    if snapshot.len() < min_context {
        debug!(
            "Backfill skipped: {} successful page(s), need {}",
            snapshot.len(),
            min_context
        );
        return map;
    }

    let mut filled = 0;
    for (page, range) in map.iter_mut() {
        if !range.is_failed() {
            continue;
        }
        // `min_by_key` keeps the first minimum, so ties go to the preceding page.
        let Some((neighbour, anchor)) = snapshot
            .iter()
            .min_by_key(|(q, _)| (i64::from(*q) - i64::from(*page)).abs())
        else {
            continue;
        };
        let inferred = extrapolate(*neighbour, *anchor, *page);
        if inferred.start_page_no > 0 {
            *range = inferred;
            filled += 1;
        }
    }
    if filled > 0 {
        debug!("Backfill inferred {} page(s)", filled);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(entries: &[(u32, i64, i64)]) -> PageRangeMap {
        entries
            .iter()
            .map(|&(p, s, e)| {
                (
                    p,
                    PageRange {
                        start_page_no: s,
                        end_page_no: e,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_negative_values_become_sentinel() {
        let m = normalize_negative(map_of(&[(1, -1, -1), (2, 3, -2), (3, 4, 4)]));
        assert_eq!(m[&1], PageRange::FAILED);
        assert_eq!(m[&2], PageRange::FAILED);
        assert_eq!(m[&3], PageRange::single(4));
    }

    #[test]
    fn test_outlier_before_anchor_is_reset() {
        let m = detect_outliers(map_of(&[(1, 100, 100), (2, 10, 10), (3, 11, 11), (4, 12, 12)]), 10);
        assert_eq!(m[&1], PageRange::FAILED);
        assert_eq!(m[&2], PageRange::single(10));
    }

    #[test]
    fn test_value_within_threshold_is_kept() {
        let m = detect_outliers(map_of(&[(1, 15, 15), (2, 10, 10), (3, 11, 11), (4, 12, 12)]), 10);
        assert_eq!(m[&1], PageRange::single(15));
    }

    #[test]
    fn test_no_anchor_leaves_map_alone() {
        let input = map_of(&[(1, 100, 100), (2, 10, 10), (3, 0, 0), (4, 12, 12)]);
        assert_eq!(detect_outliers(input.clone(), 10), input);
    }

    #[test]
    fn test_double_sided_anchor() {
        let m = detect_outliers(
            map_of(&[(1, 90, 91), (2, 3, 4), (3, 5, 6), (4, 7, 8)]),
            10,
        );
        assert_eq!(m[&1], PageRange::FAILED);
    }

    #[test]
    fn test_drop_reanchors_earlier_pages() {
        // 7, 8 then a restart at 3 on page 3: pages 1-2 become 1, 2.
        let m = detect_drops(map_of(&[(1, 7, 7), (2, 8, 8), (3, 3, 3), (4, 4, 4)]));
        assert_eq!(m[&1], PageRange::single(1));
        assert_eq!(m[&2], PageRange::single(2));
        assert_eq!(m[&3], PageRange::single(3));
    }

    #[test]
    fn test_drop_non_positive_becomes_sentinel() {
        let m = detect_drops(map_of(&[(1, 5, 5), (2, 6, 6), (3, 1, 1)]));
        assert_eq!(m[&1], PageRange::FAILED);
        assert_eq!(m[&2], PageRange::FAILED);
        assert_eq!(m[&3], PageRange::single(1));
    }

    #[test]
    fn test_decrease_of_one_is_not_a_drop() {
        let input = map_of(&[(1, 5, 5), (2, 4, 4)]);
        assert_eq!(detect_drops(input.clone()), input);
    }

    #[test]
    fn test_backfill_double_sided() {
        let m = backfill(
            map_of(&[(1, 0, 0), (2, 0, 0), (3, 5, 6), (4, 7, 8), (5, 9, 10)]),
            2,
        );
        assert_eq!(m[&1], PageRange::spread(1));
        assert_eq!(m[&2], PageRange::spread(3));
    }

    #[test]
    fn test_backfill_keeps_sentinel_below_one() {
        // printed = physical - 3, so pages 1 and 2 would be -2 and -1
        let m = backfill(map_of(&[(1, 0, 0), (2, 0, 0), (4, 1, 1), (5, 2, 2)]), 2);
        assert_eq!(m[&1], PageRange::FAILED);
        assert_eq!(m[&2], PageRange::FAILED);
    }

    #[test]
    fn test_backfill_prefers_preceding_neighbour_on_tie() {
        let m = backfill(map_of(&[(1, 1, 1), (2, 0, 0), (3, 10, 10)]), 2);
        assert_eq!(m[&2], PageRange::single(2));
    }

    #[test]
    fn test_backfill_needs_context() {
        let input = map_of(&[(1, 0, 0), (2, 5, 5)]);
        assert_eq!(backfill(input.clone(), 2), input);
    }

    #[test]
    fn test_full_pipeline() {
        let m = postprocess(
            map_of(&[(1, -4, -4), (2, 100, 100), (3, 3, 3), (4, 4, 4), (5, 5, 5), (6, 0, 0)]),
            &PostprocessOptions::default(),
        );
        assert_eq!(m[&1], PageRange::single(1));
        assert_eq!(m[&2], PageRange::single(2));
        assert_eq!(m[&6], PageRange::single(6));
    }
}
