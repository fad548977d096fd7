//! Simplified layout used when pagination fails
//!
//! Every source page is copied as-is, shrunk by a uniform factor. There is no
//! grid and nothing is rasterized.

use crate::document::number;
use crate::error::LayoutError;
use crate::merge::normalize_page_tree;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream};
use std::path::Path;

const PAGE_BOXES: [&[u8]; 5] = [b"MediaBox", b"CropBox", b"BleedBox", b"TrimBox", b"ArtBox"];

/// Write a copy of `source` with every page scaled by `scale`
///
/// Returns the number of pages written.
pub fn shrink_pages(source: &Path, output: &Path, scale: f32) -> Result<usize, LayoutError> {
    if scale.is_nan() || scale <= 0.0 {
        return Err(LayoutError::InvalidInput(format!(
            "Scale must be positive, got {}",
            scale
        )));
    }

    let mut doc = Document::load(source)
        .map_err(|e| LayoutError::ParseError(format!("{}: {}", source.display(), e)))?;
    normalize_page_tree(&mut doc)?;

    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    if page_ids.is_empty() {
        return Err(LayoutError::InvalidInput("Document has no pages".into()));
    }

    // Shared by every page
    let (prefix_id, suffix_id) = scaling_streams(&mut doc, scale)?;

    for &page_id in &page_ids {
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;

        if let Ok(contents) = page.get(b"Contents") {
            let mut wrapped = vec![Object::Reference(prefix_id)];
            match contents {
                Object::Array(streams) => wrapped.extend(streams.iter().cloned()),
                other => wrapped.push(other.clone()),
            }
            wrapped.push(Object::Reference(suffix_id));
            page.set("Contents", Object::Array(wrapped));
        }

        for key in PAGE_BOXES {
            if let Ok(Object::Array(values)) = page.get_mut(key) {
                for value in values.iter_mut() {
                    if let Some(v) = number(value) {
                        *value = Object::Real(v * scale);
                    }
                }
            }
        }
    }

    doc.compress();
    doc.save(output)
        .map_err(|e| LayoutError::OperationError(format!("Failed to save {}: {}", output.display(), e)))?;

    tracing::info!("Fallback layout wrote {} pages at scale {}", page_ids.len(), scale);
    Ok(page_ids.len())
}

/// `q s 0 0 s 0 0 cm` and the matching `Q`
fn scaling_streams(doc: &mut Document, scale: f32) -> Result<(ObjectId, ObjectId), LayoutError> {
    let mut prefix = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(scale),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(scale),
                    Object::Real(0.0),
                    Object::Real(0.0),
                ],
            ),
        ],
    }
    .encode()?;
    // Readers join the Contents array byte for byte, so both streams need a
    // separator on the side that touches the page's own content
    prefix.push(b'\n');
    let mut suffix = vec![b'\n'];
    suffix.extend(
        Content {
            operations: vec![Operation::new("Q", vec![])],
        }
        .encode()?,
    );

    let prefix_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), prefix));
    let suffix_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), suffix));
    Ok((prefix_id, suffix_id))
}
