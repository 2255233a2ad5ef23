//! Text patterns used by the TOC locator.
//!
//! Three detectors live here, each a cheap pure function over a string:
//!
//! 1. **Keywords** - TOC headings (`목차`, `Contents`, `(continued)`, …) and
//!    the relaxed set that also accepts bare markers (`계속`, `continued`).
//! 2. **Page-number pattern** - an entry line ending in a page number that
//!    follows a run of dot/ellipsis leaders or plain whitespace.
//! 3. **Resource-index labels** - the first column of figure/photo/drawing
//!    plate lists (`[도면 3]`, `Fig. 12`), which look like a TOC but are not.

use once_cell::sync::Lazy;
use regex::Regex;

/// Built-in TOC heading keywords. Matching ignores case and whitespace, so
/// `목 차` and `TABLE OF CONTENTS` are covered by their compact forms.
pub const BUILTIN_TOC_KEYWORDS: &[&str] = &[
    "목차",
    "목 차",
    "차례",
    "목차(계속)",
    "차례(계속)",
    "(계속)",
    "(continued)",
    "Table of Contents",
    "Contents",
    "目次",
];

/// Bare markers that only make sense on a continuation page. The
/// parenthesised forms are full headings.
pub const CONTINUATION_MARKERS: &[&str] = &["계속", "continued"];

/// Headings longer than this are body text that happens to mention a keyword.
pub const MAX_KEYWORD_TEXT_CHARS: usize = 40;

/// Lowercase and drop all whitespace.
pub fn normalize_keyword_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Keyword set (built-ins plus caller extras), pre-normalised.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    continuation: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(additional_keywords: &[String]) -> Self {
        let mut keywords: Vec<String> = BUILTIN_TOC_KEYWORDS
            .iter()
            .map(|k| normalize_keyword_text(k))
            .chain(additional_keywords.iter().map(|k| normalize_keyword_text(k)))
            .filter(|k| !k.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();

        let continuation = CONTINUATION_MARKERS
            .iter()
            .map(|k| normalize_keyword_text(k))
            .collect();

        Self {
            keywords,
            continuation,
        }
    }

    /// `true` when `text` is a short heading containing a TOC keyword.
    pub fn is_toc_heading(&self, text: &str) -> bool {
        let norm = normalize_keyword_text(text);
        if norm.is_empty() || norm.chars().count() > MAX_KEYWORD_TEXT_CHARS {
            return false;
        }
        self.keywords.iter().any(|k| norm.contains(k.as_str()))
    }

    /// Relaxed match used on expansion pages: a TOC heading or a bare
    /// continuation marker.
    pub fn is_continuation_marker(&self, text: &str) -> bool {
        if self.is_toc_heading(text) {
            return true;
        }
        let norm = normalize_keyword_text(text);
        if norm.is_empty() || norm.chars().count() > MAX_KEYWORD_TEXT_CHARS {
            return false;
        }
        self.continuation.iter().any(|k| norm.contains(k.as_str()))
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new(&[])
    }
}

// ── Page-number pattern ──────────────────────────────────────────────────────

static RE_PAGE_NUMBER_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<title>.*?\S)(?:\s*[.·…‥ㆍ・_\-]{2,}\s*|\s*…\s*|\s+)(?P<page>\d{1,4})$")
        .unwrap()
});

/// `true` for entry lines like `"Chapter 1 ..... 10"` or `"Introduction … 1"`.
pub fn has_page_number_pattern(text: &str) -> bool {
    RE_PAGE_NUMBER_ENTRY.is_match(text.trim())
}

/// Page number at the end of a TOC-style entry line.
pub fn trailing_page_number(text: &str) -> Option<u32> {
    RE_PAGE_NUMBER_ENTRY
        .captures(text.trim())
        .and_then(|c| c.name("page"))
        .and_then(|m| m.as_str().parse().ok())
}

/// `true` when a table cell holds only a page number.
pub fn is_numeric_cell(text: &str) -> bool {
    let t = text.trim();
    !t.is_empty() && t.len() <= 5 && t.chars().all(|c| c.is_ascii_digit())
}

// ── Resource-index labels ────────────────────────────────────────────────────

static RE_RESOURCE_KO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\[\(〈【<]\s*(도면|사진|그림|도판|삽도|원색사진|표)\s*-?\s*\d+").unwrap()
});

static RE_RESOURCE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(fig(ure)?|photo(graph)?|plate|pl|map|drawing)\.?\s*\d+").unwrap()
});

/// `true` for first-column labels of a drawing/photo/plate list.
pub fn is_resource_label(text: &str) -> bool {
    let t = text.trim();
    RE_RESOURCE_KO.is_match(t) || RE_RESOURCE_EN.is_match(t)
}
