//! Flatten a located TOC region into plain text for the entry extractor.

use crate::document::Document;
use crate::output::TocLocation;
use crate::resolver::{Node, RefResolver, MAX_TREE_DEPTH};

/// Text of every container in `location`, in order.
///
/// Group descendants become one line each; table rows become one line with
/// cells joined by ` | `. Containers are separated by a blank line.
/// Unresolvable refs are skipped.
pub fn render_toc_text(document: &Document, location: &TocLocation) -> String {
    let resolver = RefResolver::new(document);
    let blocks: Vec<String> = location
        .item_refs
        .iter()
        .filter_map(|r| resolver.resolve(r))
        .map(|node| {
            let mut lines = Vec::new();
            collect_lines(&resolver, node, 0, &mut lines);
            lines.join("\n")
        })
        .filter(|block| !block.is_empty())
        .collect();
    blocks.join("\n\n")
}

fn collect_lines<'a>(resolver: &RefResolver<'a>, node: Node<'a>, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_TREE_DEPTH {
        return;
    }
    match node {
        Node::Text(t) => {
            let text = t.text.trim();
            if !text.is_empty() {
                out.push(text.to_string());
            }
        }
        Node::Table(t) => {
            for row in t.data.rows() {
                let cells: Vec<&str> = row
                    .iter()
                    .map(|c| c.text.trim())
                    .filter(|c| !c.is_empty())
                    .collect();
                if !cells.is_empty() {
                    out.push(cells.join(" | "));
                }
            }
            return;
        }
        Node::Picture(_) => return,
        Node::Group(_) | Node::Root(_) => {}
    }
    for child in node.children() {
        if let Some(child) = resolver.resolve(&child.cref) {
            collect_lines(resolver, child, depth + 1, out);
        }
    }
}
