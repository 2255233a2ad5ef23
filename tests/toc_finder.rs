//! TOC locator scenarios on hand-built document trees.

mod common;

use common::{DocBuilder, A4};
use edgequake_docstruct::document::BODY_REF;
use edgequake_docstruct::{render_toc_text, Document, TocFinder, TocFinderOptions};

fn find(doc: &Document) -> edgequake_docstruct::TocLocation {
    TocFinder::default().find(doc).expect("TOC should be found")
}

#[test]
fn korean_heading_inside_entry_group() {
    let mut b = DocBuilder::new();
    let toc = b.group(BODY_REF, "list");
    b.labelled_text(&toc, "section_header", "목차", 1);
    b.labelled_text(&toc, "list_item", "제1장 조사 개요 ..... 1", 1);
    b.labelled_text(&toc, "list_item", "제2장 유적 현황 ..... 5", 1);
    b.text(BODY_REF, "제1장 조사 개요", 2);
    let doc = b.pages(2, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![toc]);
    assert_eq!(loc.start_page, 1);
    assert_eq!(loc.end_page, 1);
}

#[test]
fn keyword_page_lies_within_result() {
    let mut b = DocBuilder::new();
    b.text(BODY_REF, "Annual Report 2024", 1);
    b.text(BODY_REF, "Foreword by the director", 2);
    let toc = b.group(BODY_REF, "group");
    b.text(&toc, "Table of Contents", 3);
    b.text(&toc, "Introduction … 1", 3);
    let doc = b.pages(5, A4).build();

    let loc = find(&doc);
    assert!(loc.item_refs.contains(&toc));
    assert!(loc.contains_page(3), "{loc:?}");
}

#[test]
fn empty_document_is_not_found() {
    let err = TocFinder::default()
        .find(&Document::default())
        .expect_err("nothing to find");
    assert_eq!(err.searched_pages, 10);
    assert!(err.keyword_hit.is_none());
}

#[test]
fn loose_heading_uses_sibling_group() {
    let mut b = DocBuilder::new();
    b.text(BODY_REF, "Annual Report", 1);
    b.labelled_text(BODY_REF, "section_header", "Contents", 2);
    let toc = b.list(
        BODY_REF,
        &["Introduction ..... 1", "Methods ..... 4", "Results ..... 9"],
        2,
    );
    b.text(BODY_REF, "Introduction", 3);
    let doc = b.pages(3, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![toc]);
    assert_eq!((loc.start_page, loc.end_page), (2, 2));
}

#[test]
fn loose_heading_uses_sibling_index_table() {
    let mut b = DocBuilder::new();
    b.labelled_text(BODY_REF, "section_header", "차례", 1);
    let table = b.table(
        BODY_REF,
        "document_index",
        &[&["Ⅰ. 서론", "1"], &["Ⅱ. 조사 방법", "7"], &["Ⅲ. 조사 결과", "15"]],
        1,
    );
    let doc = b.pages(1, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![table]);
}

#[test]
fn keyword_without_entries_reports_hit() {
    let mut b = DocBuilder::new();
    let g = b.group(BODY_REF, "group");
    b.text(&g, "Contents", 1);
    b.text(&g, "This page intentionally left blank", 1);
    let doc = b.pages(1, A4).build();

    let err = TocFinder::default().find(&doc).expect_err("no entries anywhere");
    assert_eq!(err.keyword_hit.as_deref(), Some("Contents"));
}

#[test]
fn structural_fallback_finds_numbered_table() {
    let mut b = DocBuilder::new();
    b.text(BODY_REF, "Excavation Report", 1);
    let table = b.table(
        BODY_REF,
        "table",
        &[
            &["Introduction", "1"],
            &["Survey area", "6"],
            &["Features", "14"],
            &["Finds", "30"],
        ],
        3,
    );
    let doc = b.pages(4, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![table]);
    assert_eq!((loc.start_page, loc.end_page), (3, 3));
}

#[test]
fn resource_index_is_not_the_toc() {
    let mut b = DocBuilder::new();
    b.table(
        BODY_REF,
        "document_index",
        &[&["Fig. 1 Site plan", "3"], &["Fig. 2 Section", "4"], &["Fig. 3 Trench A", "9"]],
        2,
    );
    let toc = b.list(
        BODY_REF,
        &["Introduction ..... 1", "Survey ..... 4", "Finds ..... 9"],
        3,
    );
    let doc = b.pages(4, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![toc]);
    assert_eq!(loc.start_page, 3, "expansion must not absorb the figure list");
}

#[test]
fn lone_resource_index_is_returned_as_last_resort() {
    let mut b = DocBuilder::new();
    let plates = b.table(
        BODY_REF,
        "table",
        &[&["[사진 1] 전경", "3"], &["[사진 2] 근경", "4"], &["[사진 3] 토층", "5"]],
        2,
    );
    let doc = b.pages(2, A4).build();
    assert_eq!(find(&doc).item_refs, vec![plates]);
}

#[test]
fn continuation_pages_extend_forward() {
    let mut b = DocBuilder::new();
    let first = b.group(BODY_REF, "list");
    b.text(&first, "목차", 1);
    b.text(&first, "Ⅰ. 조사 개요 ······ 1", 1);
    b.text(&first, "Ⅱ. 조사 내용 ······ 9", 1);
    let second = b.group(BODY_REF, "list");
    b.text(&second, "목차(계속)", 2);
    b.text(&second, "Ⅲ. 고찰 ······ 88", 2);
    b.text(&second, "Ⅳ. 결론 ······ 120", 2);
    b.text(BODY_REF, "Ⅰ. 조사 개요", 3);
    let doc = b.pages(3, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![first, second]);
    assert_eq!((loc.start_page, loc.end_page), (1, 2));
}

#[test]
fn unmarked_entries_extend_backward() {
    let mut b = DocBuilder::new();
    b.text(BODY_REF, "Cover", 1);
    let earlier = b.list(
        BODY_REF,
        &["Preface ..... i", "Chapter 1 ..... 1", "Chapter 2 ..... 12", "Chapter 3 ..... 25"],
        2,
    );
    let later = b.group(BODY_REF, "list");
    b.text(&later, "Contents (continued)", 3);
    b.text(&later, "Chapter 4 ..... 40", 3);
    b.text(&later, "Chapter 5 ..... 57", 3);
    let doc = b.pages(4, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![earlier, later]);
    assert_eq!((loc.start_page, loc.end_page), (2, 3));
}

#[test]
fn search_budget_is_respected() {
    let mut b = DocBuilder::new();
    for page in 1..=12 {
        b.text(BODY_REF, &format!("Body page {page}"), page);
    }
    let toc = b.group(BODY_REF, "list");
    b.text(&toc, "Contents", 12);
    b.text(&toc, "Appendix A ..... 301", 12);
    let doc = b.pages(12, A4).build();

    let err = TocFinder::default().find(&doc).expect_err("beyond budget");
    assert_eq!(err.searched_pages, 10);

    let wide = TocFinder::new(TocFinderOptions::default().with_max_search_pages(12));
    assert_eq!(wide.find(&doc).expect("within budget").item_refs, vec![toc]);
}

#[test]
fn additional_keywords_extend_the_heading_set() {
    let mut b = DocBuilder::new();
    let toc = b.group(BODY_REF, "group");
    b.text(&toc, "Inhaltsverzeichnis", 1);
    b.text(&toc, "Einleitung ..... 1", 1);
    let doc = b.pages(1, A4).build();

    assert!(TocFinder::default().find(&doc).is_err());
    let finder = TocFinder::new(
        TocFinderOptions::default().with_additional_keywords(["Inhaltsverzeichnis"]),
    );
    assert_eq!(finder.find(&doc).expect("custom keyword").item_refs, vec![toc]);
}

#[test]
fn located_region_renders_as_text() {
    let mut b = DocBuilder::new();
    let toc = b.group(BODY_REF, "list");
    b.text(&toc, "Contents", 1);
    b.text(&toc, "Introduction ..... 1", 1);
    b.text(&toc, "Methods ..... 4", 1);
    let doc = b.pages(1, A4).build();

    let loc = find(&doc);
    assert_eq!(
        render_toc_text(&doc, &loc),
        "Contents\nIntroduction ..... 1\nMethods ..... 4"
    );
}

#[test]
fn container_with_own_entries_keeps_them_beside_sublists() {
    let mut b = DocBuilder::new();
    let toc = b.group(BODY_REF, "list");
    b.text(&toc, "목차", 1);
    b.text(&toc, "제1장 조사 개요 ..... 1", 1);
    b.text(&toc, "제2장 유적 현황 ..... 5", 1);
    b.list(&toc, &["2.1 위치 ..... 6", "2.2 환경 ..... 8"], 1);
    let doc = b.pages(1, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![toc]);
    let text = render_toc_text(&doc, &loc);
    assert!(text.contains("제1장 조사 개요 ..... 1"), "{text}");
    assert!(text.contains("2.2 환경 ..... 8"), "{text}");
}

#[test]
fn heading_only_container_reports_its_sublists() {
    let mut b = DocBuilder::new();
    let toc = b.group(BODY_REF, "group");
    b.text(&toc, "Contents", 1);
    let part_one = b.list(&toc, &["Introduction ..... 1", "Methods ..... 4"], 1);
    let part_two = b.list(&toc, &["Results ..... 9", "Discussion ..... 15"], 1);
    let doc = b.pages(1, A4).build();

    assert_eq!(find(&doc).item_refs, vec![part_one, part_two]);
}

#[test]
fn parenthesised_continuation_is_a_heading() {
    let mut b = DocBuilder::new();
    let toc = b.group(BODY_REF, "group");
    b.text(&toc, "(continued)", 1);
    b.text(&toc, "Chapter 4 ..... 40", 1);
    let doc = b.pages(1, A4).build();

    assert_eq!(find(&doc).item_refs, vec![toc]);
}

fn toc_on_first_page(b: &mut DocBuilder) -> String {
    let toc = b.group(BODY_REF, "list");
    b.text(&toc, "Contents", 1);
    b.text(&toc, "Introduction ..... 1", 1);
    b.text(&toc, "Methods ..... 4", 1);
    toc
}

#[test]
fn marker_under_root_stops_forward_expansion() {
    let mut b = DocBuilder::new();
    let toc = toc_on_first_page(&mut b);
    b.text(BODY_REF, "(continued)", 2);
    b.list(
        BODY_REF,
        &["Results ..... 9", "Discussion ..... 15", "Appendix ..... 20"],
        2,
    );
    let doc = b.pages(2, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![toc]);
    assert_eq!((loc.start_page, loc.end_page), (1, 1));
}

#[test]
fn marker_under_text_stops_forward_expansion() {
    let mut b = DocBuilder::new();
    let toc = toc_on_first_page(&mut b);
    let header = b.labelled_text(BODY_REF, "section_header", "Chapter listing", 2);
    b.text(&header, "continued", 2);
    b.list(
        BODY_REF,
        &["Results ..... 9", "Discussion ..... 15", "Appendix ..... 20"],
        2,
    );
    let doc = b.pages(2, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![toc]);
    assert_eq!(loc.end_page, 1);
}

#[test]
fn resource_index_stops_forward_expansion() {
    let mut b = DocBuilder::new();
    let toc = toc_on_first_page(&mut b);
    b.table(
        BODY_REF,
        "document_index",
        &[&["Fig. 1 Site plan", "3"], &["Fig. 2 Section", "4"], &["Fig. 3 Trench A", "9"]],
        2,
    );
    let doc = b.pages(3, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![toc]);
    assert_eq!((loc.start_page, loc.end_page), (1, 1));
}

#[test]
fn keyword_walks_up_through_text_ancestors() {
    let mut b = DocBuilder::new();
    let toc = b.group(BODY_REF, "list");
    let part = b.labelled_text(&toc, "section_header", "Part One", 1);
    b.labelled_text(&part, "title", "Contents", 1);
    b.text(&toc, "Introduction ..... 1", 1);
    b.text(&toc, "Methods ..... 4", 1);
    let doc = b.pages(1, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![toc]);
    assert_eq!((loc.start_page, loc.end_page), (1, 1));
}

#[test]
fn container_spanning_two_pages_is_listed_once() {
    let mut b = DocBuilder::new();
    let toc = b.group(BODY_REF, "list");
    b.text(&toc, "Chapter 1 ..... 1", 1);
    b.text(&toc, "Chapter 2 ..... 9", 1);
    b.text(&toc, "Chapter 3 ..... 17", 1);
    b.text(&toc, "Contents (continued)", 2);
    b.text(&toc, "Chapter 4 ..... 30", 2);
    b.text(BODY_REF, "Chapter 1", 3);
    let doc = b.pages(3, A4).build();

    let loc = find(&doc);
    assert_eq!(loc.item_refs, vec![toc]);
    assert_eq!((loc.start_page, loc.end_page), (1, 2));
}
