//! Shared fixtures for the integration tests: a small document builder and a
//! scripted vision caller that answers from the page number baked into each
//! test image.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_docstruct::document::{
    GroupItem, ImageRef, PageItem, ProvenanceItem, RefItem, Size, TableCell, TableData, TableItem,
    TextItem, BODY_REF,
};
use edgequake_docstruct::{
    Document, LlmUsage, ModelRole, PageImage, VisionCaller, VisionError, VisionRequest,
    VisionResponse,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const A4: Size = Size {
    width: 595.0,
    height: 842.0,
};
pub const A3_LANDSCAPE: Size = Size {
    width: 1191.0,
    height: 842.0,
};

// ── Document builder ─────────────────────────────────────────────────────────

/// Builds documents node by node; every method returns the new node's ref.
#[derive(Default)]
pub struct DocBuilder {
    doc: Document,
}

impl DocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&mut self, parent: &str, child: &str) {
        let child = RefItem::new(child);
        if parent == BODY_REF {
            self.doc.body.children.push(child);
        } else if let Some(g) = self.doc.groups.iter_mut().find(|g| g.self_ref == parent) {
            g.children.push(child);
        } else if let Some(t) = self.doc.texts.iter_mut().find(|t| t.self_ref == parent) {
            t.children.push(child);
        } else {
            panic!("unknown parent {parent}");
        }
    }

    pub fn group(&mut self, parent: &str, name: &str) -> String {
        let self_ref = format!("#/groups/{}", self.doc.groups.len());
        self.doc.groups.push(GroupItem {
            self_ref: self_ref.clone(),
            parent: Some(RefItem::new(parent)),
            children: vec![],
            name: name.into(),
            label: name.into(),
        });
        self.attach(parent, &self_ref);
        self_ref
    }

    pub fn text(&mut self, parent: &str, text: &str, page: u32) -> String {
        self.labelled_text(parent, "text", text, page)
    }

    pub fn labelled_text(&mut self, parent: &str, label: &str, text: &str, page: u32) -> String {
        let self_ref = format!("#/texts/{}", self.doc.texts.len());
        self.doc.texts.push(TextItem {
            self_ref: self_ref.clone(),
            parent: Some(RefItem::new(parent)),
            children: vec![],
            label: label.into(),
            orig: text.into(),
            text: text.into(),
            prov: vec![ProvenanceItem::on_page(page)],
        });
        self.attach(parent, &self_ref);
        self_ref
    }

    pub fn table(&mut self, parent: &str, label: &str, rows: &[&[&str]], page: u32) -> String {
        let self_ref = format!("#/tables/{}", self.doc.tables.len());
        let grid: Vec<Vec<TableCell>> = rows
            .iter()
            .map(|r| {
                r.iter()
                    .map(|t| TableCell {
                        text: t.to_string(),
                        ..Default::default()
                    })
                    .collect()
            })
            .collect();
        self.doc.tables.push(TableItem {
            self_ref: self_ref.clone(),
            parent: Some(RefItem::new(parent)),
            children: vec![],
            label: label.into(),
            data: TableData {
                num_rows: rows.len(),
                num_cols: rows.first().map_or(0, |r| r.len()),
                table_cells: vec![],
                grid,
            },
            prov: vec![ProvenanceItem::on_page(page)],
        });
        self.attach(parent, &self_ref);
        self_ref
    }

    /// A list group holding one text per line, all on `page`.
    pub fn list(&mut self, parent: &str, lines: &[&str], page: u32) -> String {
        let g = self.group(parent, "list");
        for line in lines {
            self.labelled_text(&g, "list_item", line, page);
        }
        g
    }

    /// Pages `1..=count` of one size, each with a scripted data-URI image.
    pub fn pages(self, count: u32, size: Size) -> Self {
        self.pages_from(1, count, size)
    }

    pub fn pages_from(mut self, first: u32, count: u32, size: Size) -> Self {
        for page_no in first..first + count {
            self.doc.pages.insert(
                page_no.to_string(),
                PageItem {
                    page_no,
                    size,
                    image: Some(ImageRef {
                        mimetype: "image/png".into(),
                        uri: page_data_uri(page_no),
                    }),
                },
            );
        }
        self
    }

    pub fn without_image(mut self, page_no: u32) -> Self {
        if let Some(page) = self.doc.pages.get_mut(&page_no.to_string()) {
            page.image = None;
        }
        self
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

// ── Scripted vision caller ───────────────────────────────────────────────────

/// Data URI whose payload encodes the physical page number.
pub fn page_data_uri(page_no: u32) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(format!("page:{page_no}")))
}

fn page_of_image(image: &PageImage) -> Option<u32> {
    let raw = STANDARD.decode(&image.data).ok()?;
    String::from_utf8(raw).ok()?.strip_prefix("page:")?.parse().ok()
}

type Reader = dyn Fn(u32) -> Option<(i64, i64)> + Send + Sync;

/// Answers each request by applying `reader` to the physical page behind
/// every attached image. Records calls for later inspection.
pub struct ScriptedCaller {
    reader: Box<Reader>,
    calls: AtomicUsize,
    phases: Mutex<Vec<String>>,
    pages_seen: Mutex<Vec<Vec<u32>>>,
}

impl ScriptedCaller {
    pub fn new(reader: impl Fn(u32) -> Option<(i64, i64)> + Send + Sync + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            calls: AtomicUsize::new(0),
            phases: Mutex::new(Vec::new()),
            pages_seen: Mutex::new(Vec::new()),
        }
    }

    /// Printed number = physical number + `offset`.
    pub fn offset(offset: i64) -> Self {
        Self::new(move |p| Some((i64::from(p) + offset, i64::from(p) + offset)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn phases(&self) -> Vec<String> {
        self.phases.lock().unwrap().clone()
    }

    pub fn pages_seen(&self) -> Vec<Vec<u32>> {
        self.pages_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionCaller for ScriptedCaller {
    async fn call(&self, request: VisionRequest) -> Result<VisionResponse, VisionError> {
        if request.is_aborted() {
            return Err(VisionError::Cancelled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.phases.lock().unwrap().push(request.phase.clone());

        let pages: Vec<u32> = request
            .images
            .iter()
            .map(|img| page_of_image(img).expect("scripted image"))
            .collect();
        self.pages_seen.lock().unwrap().push(pages.clone());

        let answers: Vec<Value> = pages
            .iter()
            .enumerate()
            .map(|(i, &p)| match (self.reader)(p) {
                Some((start, end)) => json!({"imageIndex": i, "startPageNo": start, "endPageNo": end}),
                None => json!({"imageIndex": i, "startPageNo": null, "endPageNo": null}),
            })
            .collect();

        Ok(VisionResponse {
            output: json!({ "pages": answers }),
            usage: LlmUsage {
                component: request.component,
                phase: request.phase,
                model: ModelRole::Primary,
                model_name: request.primary_model,
                input_tokens: 100 * pages.len() as u64,
                output_tokens: 20,
                total_tokens: 100 * pages.len() as u64 + 20,
            },
            used_fallback: false,
        })
    }
}

/// Always fails with a provider error.
pub struct FailingCaller;

#[async_trait]
impl VisionCaller for FailingCaller {
    async fn call(&self, request: VisionRequest) -> Result<VisionResponse, VisionError> {
        Err(VisionError::Provider {
            model: request.primary_model,
            attempts: request.max_retries + 1,
            message: "503 Service Unavailable".into(),
        })
    }
}
