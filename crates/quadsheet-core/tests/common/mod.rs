//! Shared fixtures for the integration tests
#![allow(dead_code)]

use lopdf::content::Content;
use lopdf::{Document, Object};
use quadsheet_core::scratch::Scratch;
use quadsheet_core::{
    EngineConfig, LayoutEngine, LayoutError, RasterCapability, RasterImage, Rasterizer,
    RasterizerSetting, SourceDocument,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[path = "../../src/test_support.rs"]
mod test_support;

pub use test_support::pdf_with_pages;

pub fn write_pdf(dir: &Path, name: &str, num_pages: u32, prefix: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, pdf_with_pages(num_pages, prefix)).unwrap();
    path
}

/// Text between the first `(` and `)` of a page's content
pub fn page_marker(content: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(content);
    let start = text.find('(')? + 1;
    let end = start + text[start..].find(')')?;
    Some(text[start..end].to_string())
}

/// Rasterizes every page to a tiny solid bitmap, except pages whose marker
/// is listed in `fail_on`, and records the markers it saw in order.
#[derive(Default)]
pub struct FakeRasterizer {
    fail_on: Vec<String>,
    seen: Mutex<Vec<String>>,
}

impl FakeRasterizer {
    pub fn failing_on(markers: &[&str]) -> Self {
        Self {
            fail_on: markers.iter().map(|m| m.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Rasterizer for FakeRasterizer {
    fn name(&self) -> &str {
        "fake"
    }

    fn rasterize(
        &self,
        page_pdf: &Path,
        _dpi: u32,
        _scratch: &Scratch,
    ) -> Result<Option<RasterImage>, LayoutError> {
        let page = SourceDocument::open(page_pdf)?;
        assert_eq!(page.page_count(), 1, "rasterizer must get an isolated page");

        let marker = page_marker(&page.page_content(0)?).unwrap_or_default();
        self.seen.lock().unwrap().push(marker.clone());

        if self.fail_on.contains(&marker) {
            return Err(LayoutError::RasterError(format!("cannot draw {}", marker)));
        }
        RasterImage::solid(3, 4, [20, 40, 60]).map(Some)
    }
}

pub fn config(scratch_dir: &Path) -> EngineConfig {
    EngineConfig {
        rasterizer: RasterizerSetting::Disabled,
        scratch_dir: Some(scratch_dir.to_path_buf()),
        ..EngineConfig::default()
    }
}

pub fn engine_with(scratch_dir: &Path, rasterizer: Arc<FakeRasterizer>) -> LayoutEngine {
    let config = EngineConfig {
        rasterizer: RasterizerSetting::Auto,
        ..config(scratch_dir)
    };
    LayoutEngine::with_capability(config, RasterCapability::Available(rasterizer)).unwrap()
}

pub fn engine_without_rasterizer(scratch_dir: &Path) -> LayoutEngine {
    LayoutEngine::with_capability(config(scratch_dir), RasterCapability::Unavailable).unwrap()
}

fn page_operations(doc: &Document) -> Vec<Content> {
    doc.get_pages()
        .values()
        .map(|&id| Content::decode(&doc.get_page_content(id).unwrap()).unwrap())
        .collect()
}

/// Number of drawn images on each output page
pub fn images_per_page(path: &Path) -> Vec<usize> {
    let doc = Document::load(path).unwrap();
    page_operations(&doc)
        .iter()
        .map(|content| content.operations.iter().filter(|op| op.operator == "Do").count())
        .collect()
}

/// Text labels drawn on each output page
pub fn labels_per_page(path: &Path) -> Vec<Vec<String>> {
    let doc = Document::load(path).unwrap();
    page_operations(&doc)
        .iter()
        .map(|content| {
            content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| match op.operands.first() {
                    Some(Object::String(bytes, _)) => {
                        Some(String::from_utf8_lossy(bytes).into_owned())
                    }
                    _ => None,
                })
                .collect()
        })
        .collect()
}

/// Width and height of each page's MediaBox
pub fn page_sizes(path: &Path) -> Vec<(f32, f32)> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).unwrap();
            let values: Vec<f32> = page
                .get(b"MediaBox")
                .unwrap()
                .as_array()
                .unwrap()
                .iter()
                .map(|v| match v {
                    Object::Integer(i) => *i as f32,
                    Object::Real(r) => *r,
                    other => panic!("unexpected MediaBox entry {:?}", other),
                })
                .collect();
            (values[2] - values[0], values[3] - values[1])
        })
        .collect()
}

pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}
