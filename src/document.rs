//! Parsed document tree produced by the upstream OCR/VLM parser.
//!
//! The shape follows the Docling JSON layout: flat arrays of texts, groups,
//! tables and pictures, linked into a tree through `$ref` strings such as
//! `#/texts/3`. Two roots exist, `#/body` and `#/furniture`. The tree is a
//! read-only input here; nothing in this crate mutates it.
//!
//! Deserialisation is deliberately lenient (`#[serde(default)]` almost
//! everywhere) because different parser versions omit different fields.

use crate::error::DocStructError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reference of the main content root.
pub const BODY_REF: &str = "#/body";
/// Reference of the page-furniture root (headers, footers).
pub const FURNITURE_REF: &str = "#/furniture";

/// JSON reference to another item in the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefItem {
    #[serde(rename = "$ref")]
    pub cref: String,
}

impl RefItem {
    pub fn new(cref: impl Into<String>) -> Self {
        Self { cref: cref.into() }
    }
}

/// Bounding box of a node on its page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub l: f64,
    pub t: f64,
    pub r: f64,
    pub b: f64,
}

/// Provenance record binding a node to a physical page (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceItem {
    pub page_no: u32,
    #[serde(default)]
    pub bbox: BoundingBox,
    #[serde(default)]
    pub charspan: (usize, usize),
}

impl ProvenanceItem {
    pub fn on_page(page_no: u32) -> Self {
        Self {
            page_no,
            bbox: BoundingBox::default(),
            charspan: (0, 0),
        }
    }
}

/// A group node: an ordered container of child references.
///
/// `name` is the discriminator the parser assigns (`list`, `group`, or
/// something more specific such as `header-0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupItem {
    pub self_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RefItem>,
    #[serde(default)]
    pub children: Vec<RefItem>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
}

/// A text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub self_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RefItem>,
    #[serde(default)]
    pub children: Vec<RefItem>,
    /// Semantic label (`text`, `section_header`, `list_item`, …).
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub orig: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub prov: Vec<ProvenanceItem>,
}

/// A single table cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start_row_offset_idx: usize,
    #[serde(default)]
    pub end_row_offset_idx: usize,
    #[serde(default)]
    pub start_col_offset_idx: usize,
    #[serde(default)]
    pub end_col_offset_idx: usize,
    #[serde(default)]
    pub column_header: bool,
    #[serde(default)]
    pub row_header: bool,
}

/// Table structure. Either `grid` or `table_cells` may be populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    #[serde(default)]
    pub num_rows: usize,
    #[serde(default)]
    pub num_cols: usize,
    #[serde(default)]
    pub table_cells: Vec<TableCell>,
    #[serde(default)]
    pub grid: Vec<Vec<TableCell>>,
}

impl TableData {
    /// Row-major view of the table.
    ///
    /// Uses `grid` when the parser provided one, otherwise places each cell
    /// of `table_cells` by its start offsets. Missing slots are empty cells.
    pub fn rows(&self) -> Vec<Vec<TableCell>> {
        if !self.grid.is_empty() {
            return self.grid.clone();
        }
        let num_rows = self.num_rows.max(
            self.table_cells
                .iter()
                .map(|c| c.start_row_offset_idx + 1)
                .max()
                .unwrap_or(0),
        );
        let num_cols = self.num_cols.max(
            self.table_cells
                .iter()
                .map(|c| c.start_col_offset_idx + 1)
                .max()
                .unwrap_or(0),
        );
        let mut rows = vec![vec![TableCell::default(); num_cols]; num_rows];
        for cell in &self.table_cells {
            rows[cell.start_row_offset_idx][cell.start_col_offset_idx] = cell.clone();
        }
        rows
    }
}

/// A table node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableItem {
    pub self_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RefItem>,
    #[serde(default)]
    pub children: Vec<RefItem>,
    /// Semantic label (`table`, `document_index`).
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data: TableData,
    #[serde(default)]
    pub prov: Vec<ProvenanceItem>,
}

/// A picture node. Only its place in the tree matters here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureItem {
    pub self_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RefItem>,
    #[serde(default)]
    pub children: Vec<RefItem>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub prov: Vec<ProvenanceItem>,
}

/// Page dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Locator of a rendered page image.
///
/// `uri` is a `data:` URI, an `http(s)` URL, or a file path (relative paths
/// are resolved against the document's directory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default = "default_mimetype")]
    pub mimetype: String,
    pub uri: String,
}

fn default_mimetype() -> String {
    "image/png".to_string()
}

/// Metadata of one physical page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageItem {
    pub page_no: u32,
    #[serde(default)]
    pub size: Size,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

fn default_body() -> GroupItem {
    GroupItem {
        self_ref: BODY_REF.to_string(),
        parent: None,
        children: Vec::new(),
        name: "_root_".to_string(),
        label: "unspecified".to_string(),
    }
}

/// The complete parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_body")]
    pub body: GroupItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furniture: Option<GroupItem>,
    #[serde(default)]
    pub groups: Vec<GroupItem>,
    #[serde(default)]
    pub texts: Vec<TextItem>,
    #[serde(default)]
    pub tables: Vec<TableItem>,
    #[serde(default)]
    pub pictures: Vec<PictureItem>,
    /// Page metadata keyed by page number string (`"1"`, `"2"`, …).
    #[serde(default)]
    pub pages: BTreeMap<String, PageItem>,
    /// Directory used to resolve relative image paths. Not serialised.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            name: String::new(),
            body: default_body(),
            furniture: None,
            groups: Vec::new(),
            texts: Vec::new(),
            tables: Vec::new(),
            pictures: Vec::new(),
            pages: BTreeMap::new(),
            base_dir: None,
        }
    }
}

impl Document {
    /// Parse a document from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, DocStructError> {
        serde_json::from_str(json).map_err(|e| DocStructError::InvalidDocument(e.to_string()))
    }

    /// Load a document from a JSON file, remembering its directory for
    /// relative image locators.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocStructError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DocStructError::DocumentRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut doc = Self::from_json_str(&json)?;
        doc.base_dir = path.parent().map(Path::to_path_buf);
        Ok(doc)
    }

    /// Pages sorted by physical page number.
    pub fn pages_in_order(&self) -> Vec<&PageItem> {
        let mut pages: Vec<&PageItem> = self.pages.values().collect();
        pages.sort_by_key(|p| p.page_no);
        pages
    }

    /// Number of physical pages.
    ///
    /// Falls back to the highest provenance page when the parser did not
    /// emit page metadata.
    pub fn page_count(&self) -> u32 {
        if let Some(max) = self.pages.values().map(|p| p.page_no).max() {
            return max;
        }
        let text_pages = self.texts.iter().flat_map(|t| t.prov.iter());
        let table_pages = self.tables.iter().flat_map(|t| t.prov.iter());
        text_pages
            .chain(table_pages)
            .map(|p| p.page_no)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "name": "report",
        "body": {"self_ref": "#/body", "children": [{"$ref": "#/texts/0"}], "name": "_root_", "label": "unspecified"},
        "texts": [
            {"self_ref": "#/texts/0", "parent": {"$ref": "#/body"}, "label": "section_header",
             "orig": "목차", "text": "목차", "prov": [{"page_no": 2, "bbox": {"l": 0, "t": 0, "r": 1, "b": 1}, "charspan": [0, 2]}]}
        ],
        "pages": {"1": {"page_no": 1, "size": {"width": 595.0, "height": 842.0}},
                  "2": {"page_no": 2, "size": {"width": 595.0, "height": 842.0},
                        "image": {"mimetype": "image/png", "uri": "pages/2.png"}}}
    }"##;

    #[test]
    fn parses_docling_shape() {
        let doc = Document::from_json_str(SAMPLE).expect("valid document");
        assert_eq!(doc.texts.len(), 1);
        assert_eq!(doc.texts[0].prov[0].page_no, 2);
        assert_eq!(doc.body.children[0].cref, "#/texts/0");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(
            doc.pages["2"].image.as_ref().map(|i| i.uri.as_str()),
            Some("pages/2.png")
        );
    }

    #[test]
    fn page_count_falls_back_to_provenance() {
        let mut doc = Document::default();
        doc.texts.push(TextItem {
            self_ref: "#/texts/0".into(),
            parent: Some(RefItem::new(BODY_REF)),
            children: vec![],
            label: "text".into(),
            orig: "x".into(),
            text: "x".into(),
            prov: vec![ProvenanceItem::on_page(7)],
        });
        assert_eq!(doc.page_count(), 7);
    }

    #[test]
    fn rows_from_table_cells() {
        let data = TableData {
            num_rows: 2,
            num_cols: 2,
            table_cells: vec![
                TableCell {
                    text: "a".into(),
                    start_row_offset_idx: 0,
                    start_col_offset_idx: 0,
                    ..Default::default()
                },
                TableCell {
                    text: "d".into(),
                    start_row_offset_idx: 1,
                    start_col_offset_idx: 1,
                    ..Default::default()
                },
            ],
            grid: vec![],
        };
        let rows = data.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].text, "a");
        assert_eq!(rows[0][1].text, "");
        assert_eq!(rows[1][1].text, "d");
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = Document::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, DocStructError::InvalidDocument(_)));
    }
}
