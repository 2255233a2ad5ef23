//! TOC locator: find the table-of-contents region of a parsed document.
//!
//! ## Stages
//!
//! ```text
//! keyword search ──found──▶ ┐
//!      │ none               │
//!      ▼                    ├──▶ multi-page expansion ──▶ TocLocation
//! structural scoring ─found─┘
//!      │ none
//!      ▼
//! TocNotFoundError
//! ```
//!
//! Each stage is a function returning `Option<Found>`; the chain is a plain
//! `match`, so no "best so far" state leaks between stages.
//!
//! 1. **Keyword search** - the first short text matching a TOC keyword
//!    within the page budget. Its enclosing group/table (found by walking
//!    the parent chain) becomes the result. A loose heading whose ancestor
//!    chain reaches the root triggers a sibling search on the same page.
//! 2. **Structural scoring** - every list-like group and every table is
//!    scored by how many entries end in a page number; resource-index
//!    tables (figure/photo plates) are penalised and kept out of the result
//!    unless nothing else exists.
//! 3. **Expansion** - the page range grows forward and backward while
//!    neighbouring pages carry continuation content.

use crate::config::TocFinderOptions;
use crate::document::{Document, TableItem, TextItem};
use crate::error::TocNotFoundError;
use crate::output::TocLocation;
use crate::resolver::{Node, RefResolver, MAX_TREE_DEPTH};
use crate::toc::patterns::{
    has_page_number_pattern, is_numeric_cell, is_resource_label, KeywordMatcher,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Minimum page-number entries for a group to qualify structurally.
pub const MIN_GROUP_ENTRIES: usize = 3;
/// Minimum table shape for structural analysis.
pub const MIN_TABLE_ROWS: usize = 3;
pub const MIN_TABLE_COLS: usize = 2;
/// Score bonus for tables the parser already labelled `document_index`.
pub const DOCUMENT_INDEX_BONUS: i64 = 5;
/// Score penalty for figure/photo plate lists.
pub const RESOURCE_INDEX_PENALTY: i64 = 1_000;

/// Table label the layout model assigns to detected indexes.
pub const DOCUMENT_INDEX_LABEL: &str = "document_index";

/// Group discriminators that may hold TOC entries.
const LIST_GROUP_NAMES: &[&str] = &["list", "group"];

/// Locates the table of contents in a document tree.
#[derive(Debug, Clone)]
pub struct TocFinder {
    options: TocFinderOptions,
    matcher: KeywordMatcher,
}

/// Intermediate result of a stage: container refs anchored at a page.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Found {
    refs: Vec<String>,
    anchor_page: u32,
}

/// Outcome of walking up from a keyword text.
enum Ancestor<'a> {
    /// Nearest enclosing group or table.
    Container(Node<'a>),
    /// The chain reached the root; `top_ref` is the root's direct child.
    Root { top_ref: &'a str },
    /// Missing or dangling parent link.
    Dangling,
}

/// A structural TOC candidate.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    cref: &'a str,
    page: u32,
    score: i64,
    resource_index: bool,
    order: usize,
}

/// Structural verdict on a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableScore {
    score: i64,
    resource_index: bool,
}

impl TocFinder {
    pub fn new(options: TocFinderOptions) -> Self {
        let matcher = KeywordMatcher::new(&options.additional_keywords);
        Self { options, matcher }
    }

    pub fn options(&self) -> &TocFinderOptions {
        &self.options
    }

    /// Locate the TOC region.
    ///
    /// # Errors
    /// [`TocNotFoundError`] when neither the keyword nor the structural stage
    /// yields a candidate within `max_search_pages`.
    pub fn find(&self, document: &Document) -> Result<TocLocation, TocNotFoundError> {
        let search = Search {
            finder: self,
            resolver: RefResolver::new(document),
            total_pages: document.page_count(),
        };
        let budget = self.options.max_search_pages;
        info!(
            "Searching for TOC in first {} of {} pages",
            budget, search.total_pages
        );

        let (keyword_found, keyword_hit) = search.keyword_stage();
        let found = match keyword_found {
            Some(found) => {
                info!("TOC found by keyword on page {}", found.anchor_page);
                Some(found)
            }
            None => {
                debug!("Keyword stage found nothing; trying structural analysis");
                search.structural_stage()
            }
        };

        let Some(found) = found else {
            warn!("No TOC found within {} pages", budget);
            return Err(TocNotFoundError {
                searched_pages: budget,
                keyword_hit: keyword_hit.map(str::to_string),
            });
        };

        let location = search.expand(found);
        info!(
            "TOC located: {} container(s), pages {}-{}",
            location.item_refs.len(),
            location.start_page,
            location.end_page
        );
        Ok(location)
    }
}

impl Default for TocFinder {
    fn default() -> Self {
        Self::new(TocFinderOptions::default())
    }
}

/// Per-call search state: the resolver borrowed from one document.
struct Search<'f, 'a> {
    finder: &'f TocFinder,
    resolver: RefResolver<'a>,
    total_pages: u32,
}

impl<'f, 'a> Search<'f, 'a> {
    fn document(&self) -> &'a Document {
        self.resolver.document()
    }

    fn within_budget(&self, page: u32) -> bool {
        page <= self.finder.options.max_search_pages
    }

    // ── Stage 1: keyword search ─────────────────────────────────────────────

    fn keyword_stage(&self) -> (Option<Found>, Option<&'a str>) {
        let hit = self.document().texts.iter().find(|t| {
            first_page(t).is_some_and(|p| self.within_budget(p))
                && self.finder.matcher.is_toc_heading(&t.text)
        });
        let Some(text) = hit else {
            debug!("No TOC keyword within the page budget");
            return (None, None);
        };
        let Some(page) = first_page(text) else {
            return (None, None);
        };
        debug!("Keyword '{}' ({}) on page {}", text.text.trim(), text.self_ref, page);

        let found = match self.enclosing_container(Node::Text(text)) {
            Ancestor::Container(node) => {
                if self.has_entry_content(&node) {
                    debug!("Keyword container {} accepted", node.self_ref());
                    Some(Found {
                        refs: self.container_refs(&node),
                        anchor_page: page,
                    })
                } else {
                    debug!(
                        "Keyword container {} has no page-number entries",
                        node.self_ref()
                    );
                    None
                }
            }
            Ancestor::Root { top_ref } => {
                debug!("Keyword is a loose heading; searching siblings of {}", top_ref);
                self.sibling_search(top_ref, page)
            }
            Ancestor::Dangling => None,
        };
        (found, Some(text.text.trim()))
    }

    /// Walk up through non-container ancestors until a group/table or the
    /// root is reached.
    fn enclosing_container(&self, start: Node<'a>) -> Ancestor<'a> {
        let mut current = start;
        for _ in 0..MAX_TREE_DEPTH {
            let Some(parent) = current.parent() else {
                return Ancestor::Dangling;
            };
            if self.resolver.is_root(&parent.cref) {
                return Ancestor::Root {
                    top_ref: current.self_ref(),
                };
            }
            match self.resolver.resolve(&parent.cref) {
                Some(node) if node.is_container() => return Ancestor::Container(node),
                Some(node) => current = node,
                None => return Ancestor::Dangling,
            }
        }
        Ancestor::Dangling
    }

    /// Scan the root's children after `top_ref` for the first TOC-like group
    /// or index table on the same page.
    fn sibling_search(&self, top_ref: &str, page: u32) -> Option<Found> {
        let top = self.resolver.resolve(top_ref)?;
        let root = match self.resolver.parent_of(&top)? {
            Node::Root(g) => g,
            _ => return None,
        };
        let pos = root.children.iter().position(|c| c.cref == top_ref)?;

        for child in &root.children[pos + 1..] {
            let Some(node) = self.resolver.resolve(&child.cref) else {
                continue;
            };
            match self.resolver.page_of(&child.cref) {
                Some(p) if p > page => break,
                Some(p) if p == page => {}
                _ => continue,
            }
            let accept = match node {
                Node::Group(_) => self.has_entry_content(&node),
                Node::Table(t) => {
                    let score = evaluate_table(t);
                    !score.is_some_and(|s| s.resource_index)
                        && (t.label == DOCUMENT_INDEX_LABEL || score.is_some())
                }
                _ => false,
            };
            if accept {
                debug!("Sibling {} accepted on page {}", child.cref, page);
                return Some(Found {
                    refs: self.container_refs(&node),
                    anchor_page: page,
                });
            }
        }
        None
    }

    // ── Stage 2: structural scoring ─────────────────────────────────────────

    fn structural_stage(&self) -> Option<Found> {
        let mut candidates = self.structural_candidates(|p| self.within_budget(p));
        if candidates.is_empty() {
            debug!("No structural candidates within the page budget");
            return None;
        }
        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.page.cmp(&b.page))
                .then(a.order.cmp(&b.order))
        });

        if let Some(best) = candidates.iter().find(|c| !c.resource_index) {
            let mut on_page: Vec<&Candidate<'_>> = candidates
                .iter()
                .filter(|c| c.page == best.page && !c.resource_index)
                .collect();
            on_page.sort_by_key(|c| c.order);
            info!(
                "TOC found structurally on page {} (score {}, {} container(s))",
                best.page,
                best.score,
                on_page.len()
            );
            return Some(Found {
                refs: on_page.iter().map(|c| c.cref.to_string()).collect(),
                anchor_page: best.page,
            });
        }

        let best = &candidates[0];
        warn!(
            "Only a resource index ({}) was found; returning it as the TOC",
            best.cref
        );
        Some(Found {
            refs: vec![best.cref.to_string()],
            anchor_page: best.page,
        })
    }

    /// Every group and table that passes the structural TOC test on a page
    /// accepted by `page_filter`.
    fn structural_candidates(&self, page_filter: impl Fn(u32) -> bool) -> Vec<Candidate<'a>> {
        let doc = self.document();
        let mut candidates = Vec::new();

        for (i, group) in doc.groups.iter().enumerate() {
            if !LIST_GROUP_NAMES.contains(&group.name.as_str()) {
                continue;
            }
            let entries = group
                .children
                .iter()
                .filter_map(|c| self.resolver.text_of(&c.cref))
                .filter(|t| has_page_number_pattern(t))
                .count();
            if entries < MIN_GROUP_ENTRIES {
                continue;
            }
            let Some(page) = self.resolver.page_of(&group.self_ref) else {
                continue;
            };
            if page_filter(page) {
                candidates.push(Candidate {
                    cref: &group.self_ref,
                    page,
                    score: entries as i64,
                    resource_index: false,
                    order: i,
                });
            }
        }

        let offset = doc.groups.len();
        for (i, table) in doc.tables.iter().enumerate() {
            let Some(score) = evaluate_table(table) else {
                continue;
            };
            let Some(page) = self.resolver.page_of(&table.self_ref) else {
                continue;
            };
            if page_filter(page) {
                candidates.push(Candidate {
                    cref: &table.self_ref,
                    page,
                    score: score.score,
                    resource_index: score.resource_index,
                    order: offset + i,
                });
            }
        }

        candidates
    }

    // ── Stage 3: multi-page expansion ───────────────────────────────────────

    fn expand(&self, found: Found) -> TocLocation {
        let mut seen: HashSet<String> = found.refs.iter().cloned().collect();
        let mut start = found.anchor_page;
        let mut end = found
            .refs
            .iter()
            .filter_map(|r| self.last_page_of(r))
            .fold(found.anchor_page, u32::max);

        let mut forward: Vec<String> = Vec::new();
        let mut page = end + 1;
        while page <= self.total_pages {
            let Some(refs) = self.continuation_on(page) else {
                debug!("Forward expansion stops at page {}", page);
                break;
            };
            for r in refs {
                end = end.max(self.last_page_of(&r).unwrap_or(page));
                if seen.insert(r.clone()) {
                    forward.push(r);
                }
            }
            end = end.max(page);
            page = end + 1;
        }

        let mut backward: Vec<String> = Vec::new();
        while start > 1 {
            let page = start - 1;
            let Some(refs) = self.continuation_on(page) else {
                debug!("Backward expansion stops at page {}", page);
                break;
            };
            let mut fresh: Vec<String> =
                refs.into_iter().filter(|r| seen.insert(r.clone())).collect();
            fresh.append(&mut backward);
            backward = fresh;
            start = page;
        }

        let mut item_refs = backward;
        item_refs.extend(found.refs);
        item_refs.extend(forward);

        TocLocation {
            item_refs,
            start_page: start,
            end_page: end,
        }
    }

    /// TOC-like content on `page`, if any.
    ///
    /// A continuation marker decides on its own: its parent container is
    /// taken when it carries page-number entries, and anything else halts.
    /// Without a marker, containers starting on the page must pass the
    /// structural test; a resource index among them halts.
    fn continuation_on(&self, page: u32) -> Option<Vec<String>> {
        let marker = self.document().texts.iter().find(|t| {
            first_page(t) == Some(page) && self.finder.matcher.is_continuation_marker(&t.text)
        });

        if let Some(marker) = marker {
            debug!("Continuation marker '{}' on page {}", marker.text.trim(), page);
            let parent = marker.parent.as_ref()?;
            let node = self.resolver.resolve(&parent.cref)?;
            return match node {
                Node::Group(_) if self.has_entry_content(&node) => Some(self.container_refs(&node)),
                Node::Table(t) if self.has_entry_content(&node) => {
                    if evaluate_table(t).is_some_and(|s| s.resource_index) {
                        None
                    } else {
                        Some(vec![t.self_ref.clone()])
                    }
                }
                _ => None,
            };
        }

        let mut candidates = self.structural_candidates(|p| p == page);
        if candidates.is_empty() {
            return None;
        }
        if candidates.iter().any(|c| c.resource_index) {
            debug!("Resource index on page {}; not a TOC continuation", page);
            return None;
        }
        candidates.sort_by_key(|c| c.order);
        Some(candidates.iter().map(|c| c.cref.to_string()).collect())
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    /// Refs to report for a container: the container itself when it holds
    /// entries directly or is a leaf, otherwise its nested containers.
    fn container_refs(&self, node: &Node<'a>) -> Vec<String> {
        let own_entries = node
            .children()
            .iter()
            .filter_map(|c| self.resolver.text_of(&c.cref))
            .any(has_page_number_pattern);
        if own_entries || matches!(node, Node::Table(_)) {
            return vec![node.self_ref().to_string()];
        }

        let nested: Vec<String> = node
            .children()
            .iter()
            .filter(|c| match self.resolver.resolve(&c.cref) {
                Some(Node::Group(_)) => true,
                Some(Node::Table(t)) => !evaluate_table(t).is_some_and(|s| s.resource_index),
                _ => false,
            })
            .map(|c| c.cref.clone())
            .collect();
        if nested.is_empty() {
            vec![node.self_ref().to_string()]
        } else {
            nested
        }
    }

    /// `true` when the container holds at least one TOC-style entry.
    fn has_entry_content(&self, node: &Node<'a>) -> bool {
        match node {
            Node::Group(_) => self.any_descendant_entry(node, 0),
            Node::Table(t) => {
                t.label == DOCUMENT_INDEX_LABEL
                    || t.data.rows().iter().any(|row| {
                        row.last().is_some_and(|c| is_numeric_cell(&c.text))
                            || row.iter().any(|c| has_page_number_pattern(&c.text))
                    })
            }
            _ => false,
        }
    }

    fn any_descendant_entry(&self, node: &Node<'a>, depth: usize) -> bool {
        if depth > MAX_TREE_DEPTH {
            return false;
        }
        node.children()
            .iter()
            .any(|c| match self.resolver.resolve(&c.cref) {
                Some(Node::Text(t)) => has_page_number_pattern(&t.text),
                Some(child @ Node::Group(_)) => self.any_descendant_entry(&child, depth + 1),
                _ => false,
            })
    }

    /// Last physical page touched by a container or any of its descendants.
    fn last_page_of(&self, cref: &str) -> Option<u32> {
        self.last_page_bounded(cref, 0)
    }

    fn last_page_bounded(&self, cref: &str, depth: usize) -> Option<u32> {
        if depth > MAX_TREE_DEPTH {
            return None;
        }
        let node = self.resolver.resolve(cref)?;
        let own = match node {
            Node::Text(t) => t.prov.iter().map(|p| p.page_no).max(),
            Node::Table(t) => t.prov.iter().map(|p| p.page_no).max(),
            Node::Picture(p) => p.prov.iter().map(|p| p.page_no).max(),
            Node::Group(_) | Node::Root(_) => None,
        };
        node.children()
            .iter()
            .filter_map(|c| self.last_page_bounded(&c.cref, depth + 1))
            .chain(own)
            .max()
    }
}

fn first_page(text: &TextItem) -> Option<u32> {
    text.prov.first().map(|p| p.page_no)
}

/// Structural TOC test for a table.
///
/// Requires at least 3 rows and 2 columns, then either the
/// `document_index` label or a majority of numeric last-column cells among
/// the non-header rows. Resource indexes still qualify but carry
/// [`RESOURCE_INDEX_PENALTY`].
fn evaluate_table(table: &TableItem) -> Option<TableScore> {
    let rows = table.data.rows();
    let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    if rows.len() < MIN_TABLE_ROWS || cols < MIN_TABLE_COLS {
        return None;
    }

    let data_rows: Vec<_> = rows
        .iter()
        .filter(|row| !row.iter().any(|c| c.column_header))
        .collect();
    if data_rows.is_empty() {
        return None;
    }

    let numeric = data_rows
        .iter()
        .filter(|row| row.get(cols - 1).is_some_and(|c| is_numeric_cell(&c.text)))
        .count();
    let labelled_index = table.label == DOCUMENT_INDEX_LABEL;
    if !labelled_index && numeric * 2 <= data_rows.len() {
        return None;
    }

    let resource_rows = data_rows
        .iter()
        .filter(|row| row.first().is_some_and(|c| is_resource_label(&c.text)))
        .count();
    let resource_index = resource_rows * 2 > data_rows.len();

    let mut score = numeric as i64;
    if labelled_index {
        score += DOCUMENT_INDEX_BONUS;
    }
    if resource_index {
        score -= RESOURCE_INDEX_PENALTY;
    }
    Some(TableScore {
        score,
        resource_index,
    })
}
