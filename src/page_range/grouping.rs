//! Split the document's pages into consecutive runs of the same page size.
//!
//! Scans and spreads usually change size where the numbering scheme changes
//! (cover, fold-out plates, two-page spreads), so each run gets its own
//! pattern.

use crate::document::{Document, PageItem, Size};

/// A run of consecutive pages sharing one size.
#[derive(Debug, Clone)]
pub struct PageGroup<'a> {
    pub pages: Vec<&'a PageItem>,
}

impl<'a> PageGroup<'a> {
    pub fn first_page(&self) -> u32 {
        self.pages.first().map_or(0, |p| p.page_no)
    }

    pub fn last_page(&self) -> u32 {
        self.pages.last().map_or(0, |p| p.page_no)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn same_size(a: &Size, b: &Size, tolerance: f64) -> bool {
    (a.width - b.width).abs() <= tolerance && (a.height - b.height).abs() <= tolerance
}

/// Group pages in physical order. A page joins the current run when its
/// size is within `tolerance` of the run's first page.
pub fn group_pages(document: &Document, tolerance: f64) -> Vec<PageGroup<'_>> {
    let mut groups: Vec<PageGroup<'_>> = Vec::new();
    for page in document.pages_in_order() {
        match groups.last_mut() {
            Some(group)
                if group
                    .pages
                    .first()
                    .is_some_and(|first| same_size(&first.size, &page.size, tolerance)) =>
            {
                group.pages.push(page);
            }
            _ => groups.push(PageGroup { pages: vec![page] }),
        }
    }
    groups
}
