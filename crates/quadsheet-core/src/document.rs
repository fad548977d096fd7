//! Read-only source documents
//!
//! A [`SourceDocument`] is loaded once per conversion. Single pages are cut
//! out of it using "Construction by Whitelist": clone, keep only the target
//! page in the page tree, prune what is no longer reachable.

use crate::error::LayoutError;
use crate::merge::{normalize_page_tree, pages_root_id};
use lopdf::{Document, Object, ObjectId};
use serde::Serialize;
use std::path::Path;

pub struct SourceDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl SourceDocument {
    /// Load a PDF from disk. The file itself is never modified.
    pub fn open(path: &Path) -> Result<Self, LayoutError> {
        let doc = Document::load(path)
            .map_err(|e| LayoutError::ParseError(format!("{}: {}", path.display(), e)))?;
        Self::from_document(doc)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LayoutError> {
        let doc = Document::load_mem(bytes).map_err(|e| LayoutError::ParseError(e.to_string()))?;
        Self::from_document(doc)
    }

    fn from_document(mut doc: Document) -> Result<Self, LayoutError> {
        // Single-page extraction relies on every page hanging off the root node
        normalize_page_tree(&mut doc)?;
        let page_ids = doc.get_pages().values().copied().collect();
        Ok(Self { doc, page_ids })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, LayoutError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(LayoutError::PageOutOfRange {
                index,
                count: self.page_ids.len(),
            })
    }

    /// Width and height of a page's MediaBox, in points
    pub fn page_size(&self, index: usize) -> Result<(f32, f32), LayoutError> {
        let page_id = self.page_id(index)?;
        let [x0, y0, x1, y1] = media_box(&self.doc, page_id).ok_or_else(|| {
            LayoutError::OperationError(format!("Page {} has no MediaBox", index + 1))
        })?;
        Ok(((x1 - x0).abs(), (y1 - y0).abs()))
    }

    /// Decoded content stream of a page
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>, LayoutError> {
        let page_id = self.page_id(index)?;
        Ok(self.doc.get_page_content(page_id)?)
    }

    /// Serialize a one-page document holding only page `index` (0-based)
    pub fn extract_page(&self, index: usize) -> Result<Vec<u8>, LayoutError> {
        let page_id = self.page_id(index)?;

        let mut new_doc = self.doc.clone();
        let pages_id = pages_root_id(&new_doc)?;

        // Pages are flat after normalization, so the root's Kids is the whitelist
        match new_doc.objects.get_mut(&pages_id) {
            Some(Object::Dictionary(pages_dict)) => {
                pages_dict.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
                pages_dict.set("Count", Object::Integer(1));
            }
            _ => {
                return Err(LayoutError::OperationError(
                    "Invalid pages dictionary".into(),
                ))
            }
        }

        // Everything only the other pages referenced is now unreachable
        new_doc.prune_objects();
        new_doc.compress();

        let mut buffer = Vec::new();
        new_doc
            .save_to(&mut buffer)
            .map_err(|e| LayoutError::OperationError(format!("Save failed: {}", e)))?;

        Ok(buffer)
    }
}

/// Read a page's MediaBox as [x0, y0, x1, y1]
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let page = doc.get_dictionary(page_id).ok()?;
    let values = page.get(b"MediaBox").ok()?.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = number(value)?;
    }
    Some(rect)
}

/// Integer or real PDF number as f32
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

/// PDF file information extracted during validation
#[derive(Debug, Clone, Serialize, Default)]
pub struct PdfInfo {
    /// Number of pages in the document
    pub page_count: usize,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// Whether the document is encrypted
    pub encrypted: bool,
    /// File size in bytes
    pub size_bytes: usize,
    /// Size of the first page in points, if there is one
    pub first_page_size: Option<(f32, f32)>,
}

/// Validate a PDF file and extract basic info
pub fn inspect(bytes: &[u8]) -> Result<PdfInfo, LayoutError> {
    if bytes.len() < 8 {
        return Err(LayoutError::InvalidInput(
            "File too small to be a valid PDF".into(),
        ));
    }

    if !bytes.starts_with(b"%PDF-") {
        return Err(LayoutError::InvalidInput(
            "Not a valid PDF file (missing %PDF- header)".into(),
        ));
    }

    let version = std::str::from_utf8(&bytes[5..8])
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|_| "1.4".to_string());

    let doc = Document::load_mem(bytes).map_err(|e| LayoutError::ParseError(e.to_string()))?;
    let encrypted = doc.is_encrypted();
    let pages = doc.get_pages();
    let first_page_size = pages
        .values()
        .next()
        .and_then(|&id| media_box(&doc, id))
        .map(|[x0, y0, x1, y1]| ((x1 - x0).abs(), (y1 - y0).abs()));

    Ok(PdfInfo {
        page_count: pages.len(),
        version,
        encrypted,
        size_bytes: bytes.len(),
        first_page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pdf_with_pages;

    #[test]
    fn test_page_count() {
        let doc = SourceDocument::from_bytes(&pdf_with_pages(5, "Count")).unwrap();
        assert_eq!(doc.page_count(), 5);
    }

    #[test]
    fn test_extract_page_keeps_only_target() {
        let doc = SourceDocument::from_bytes(&pdf_with_pages(5, "Cut")).unwrap();
        let single = doc.extract_page(2).unwrap();

        let isolated = SourceDocument::from_bytes(&single).unwrap();
        assert_eq!(isolated.page_count(), 1);
        let text = String::from_utf8_lossy(&isolated.page_content(0).unwrap()).into_owned();
        assert!(text.contains("Cut-Page-3"), "got {:?}", text);
    }

    #[test]
    fn test_extract_first_and_last_page() {
        let doc = SourceDocument::from_bytes(&pdf_with_pages(3, "Edge")).unwrap();
        for (index, marker) in [(0, "Edge-Page-1"), (2, "Edge-Page-3")] {
            let isolated = SourceDocument::from_bytes(&doc.extract_page(index).unwrap()).unwrap();
            let text = String::from_utf8_lossy(&isolated.page_content(0).unwrap()).into_owned();
            assert!(text.contains(marker));
        }
    }

    #[test]
    fn test_extract_missing_page_fails() {
        let doc = SourceDocument::from_bytes(&pdf_with_pages(2, "Short")).unwrap();
        let err = doc.extract_page(2).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::PageOutOfRange { index: 2, count: 2 }
        ));
    }

    #[test]
    fn test_page_size_reads_media_box() {
        let doc = SourceDocument::from_bytes(&pdf_with_pages(1, "Size")).unwrap();
        let (w, h) = doc.page_size(0).unwrap();
        assert!((w - 362.83).abs() < 0.01);
        assert!((h - 272.13).abs() < 0.01);
    }

    #[test]
    fn test_open_garbage_fails_with_parse_error() {
        let err = SourceDocument::from_bytes(b"%PDF-1.7 garbage").err().unwrap();
        assert!(matches!(err, LayoutError::ParseError(_)));
    }

    #[test]
    fn test_inspect_valid_pdf() {
        let info = inspect(&pdf_with_pages(3, "Info")).unwrap();
        assert_eq!(info.page_count, 3);
        assert_eq!(info.version, "1.5");
        assert!(!info.encrypted);
        assert!(info.first_page_size.is_some());
    }

    #[test]
    fn test_inspect_rejects_missing_header() {
        let err = inspect(b"hello world, not a pdf").unwrap_err();
        assert!(err.to_string().contains("%PDF-"));
    }

    #[test]
    fn test_inspect_rejects_tiny_file() {
        assert!(inspect(b"%PDF").is_err());
    }
}
