//! Reference resolution over the document tree.
//!
//! The tree is linked through `$ref` strings with parent back-pointers. The
//! [`RefResolver`] builds one index from ref string to node at construction
//! and is the only place lookups happen; walking "up" the tree is an explicit
//! `resolve(parent_ref)` rather than a stored pointer.
//!
//! Unknown refs resolve to `None`, never to an error: the TOC heuristics
//! walk ancestor chains of noisy parser output and simply stop when a link
//! is dangling.

use crate::document::{
    Document, GroupItem, PictureItem, RefItem, TableItem, TextItem, BODY_REF, FURNITURE_REF,
};
use std::collections::HashMap;

/// A resolved node, borrowed from the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'a> {
    /// `#/body` or `#/furniture`. Never treated as a container.
    Root(&'a GroupItem),
    Group(&'a GroupItem),
    Text(&'a TextItem),
    Table(&'a TableItem),
    Picture(&'a PictureItem),
}

impl<'a> Node<'a> {
    pub fn self_ref(&self) -> &'a str {
        match self {
            Node::Root(g) | Node::Group(g) => &g.self_ref,
            Node::Text(t) => &t.self_ref,
            Node::Table(t) => &t.self_ref,
            Node::Picture(p) => &p.self_ref,
        }
    }

    pub fn parent(&self) -> Option<&'a RefItem> {
        match self {
            Node::Root(g) | Node::Group(g) => g.parent.as_ref(),
            Node::Text(t) => t.parent.as_ref(),
            Node::Table(t) => t.parent.as_ref(),
            Node::Picture(p) => p.parent.as_ref(),
        }
    }

    pub fn children(&self) -> &'a [RefItem] {
        match self {
            Node::Root(g) | Node::Group(g) => &g.children,
            Node::Text(t) => &t.children,
            Node::Table(t) => &t.children,
            Node::Picture(p) => &p.children,
        }
    }

    /// First provenance page of the node itself (groups have none).
    pub fn own_page(&self) -> Option<u32> {
        match self {
            Node::Root(_) | Node::Group(_) => None,
            Node::Text(t) => t.prov.first().map(|p| p.page_no),
            Node::Table(t) => t.prov.first().map(|p| p.page_no),
            Node::Picture(p) => p.prov.first().map(|p| p.page_no),
        }
    }

    /// `true` for group and table nodes, the only valid TOC containers.
    pub fn is_container(&self) -> bool {
        matches!(self, Node::Group(_) | Node::Table(_))
    }
}

/// Index from ref string to node, built once per document.
pub struct RefResolver<'a> {
    document: &'a Document,
    index: HashMap<&'a str, Node<'a>>,
}

impl<'a> RefResolver<'a> {
    pub fn new(document: &'a Document) -> Self {
        let capacity = document.groups.len()
            + document.texts.len()
            + document.tables.len()
            + document.pictures.len()
            + 2;
        let mut index: HashMap<&'a str, Node<'a>> = HashMap::with_capacity(capacity);

        index.insert(document.body.self_ref.as_str(), Node::Root(&document.body));
        if let Some(ref furniture) = document.furniture {
            index.insert(furniture.self_ref.as_str(), Node::Root(furniture));
        }
        for g in &document.groups {
            index.insert(g.self_ref.as_str(), Node::Group(g));
        }
        for t in &document.texts {
            index.insert(t.self_ref.as_str(), Node::Text(t));
        }
        for t in &document.tables {
            index.insert(t.self_ref.as_str(), Node::Table(t));
        }
        for p in &document.pictures {
            index.insert(p.self_ref.as_str(), Node::Picture(p));
        }

        Self { document, index }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn resolve(&self, cref: &str) -> Option<Node<'a>> {
        self.index.get(cref).copied()
    }

    /// Resolve only if the ref names a (non-root) group.
    pub fn resolve_group(&self, cref: &str) -> Option<&'a GroupItem> {
        match self.resolve(cref)? {
            Node::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Resolve only if the ref names a table.
    pub fn resolve_table(&self, cref: &str) -> Option<&'a TableItem> {
        match self.resolve(cref)? {
            Node::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn resolve_text(&self, cref: &str) -> Option<&'a TextItem> {
        match self.resolve(cref)? {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }

    /// `true` for `#/body`, `#/furniture`, or any ref indexed as a root.
    pub fn is_root(&self, cref: &str) -> bool {
        cref == BODY_REF
            || cref == FURNITURE_REF
            || matches!(self.resolve(cref), Some(Node::Root(_)))
    }

    /// Resolve the parent of `node`; `None` when absent or dangling.
    pub fn parent_of(&self, node: &Node<'a>) -> Option<Node<'a>> {
        node.parent().and_then(|p| self.resolve(&p.cref))
    }

    /// Physical page of a node: its own provenance, or for groups the page
    /// of the first descendant that has one.
    pub fn page_of(&self, cref: &str) -> Option<u32> {
        self.page_of_bounded(cref, 0)
    }

    fn page_of_bounded(&self, cref: &str, depth: usize) -> Option<u32> {
        // Malformed input can contain cycles; bound the descent.
        if depth > MAX_TREE_DEPTH {
            return None;
        }
        let node = self.resolve(cref)?;
        if let Some(page) = node.own_page() {
            return Some(page);
        }
        node.children()
            .iter()
            .find_map(|c| self.page_of_bounded(&c.cref, depth + 1))
    }

    /// Text of a text node, trimmed. `None` for other kinds.
    pub fn text_of(&self, cref: &str) -> Option<&'a str> {
        self.resolve_text(cref).map(|t| t.text.trim())
    }
}

/// Upper bound on ancestor/descendant walks.
pub(crate) const MAX_TREE_DEPTH: usize = 64;
