//! PDF Merge algorithm
//!
//! Concatenates several PDFs into one source document, preserving document
//! order and the page order inside each document.

use crate::error::LayoutError;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&str; 4] = ["MediaBox", "CropBox", "Resources", "Rotate"];

/// Guards against malformed, cyclic Parent chains
const MAX_TREE_DEPTH: usize = 64;

/// Read and merge PDFs from disk, in the given order
pub fn merge_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<u8>, LayoutError> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            LayoutError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
        })?;
        documents.push(bytes);
    }
    merge_documents(documents)
}

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, return it as-is
/// 3. Use the first document as the destination
/// 4. For each further document:
///    a. Calculate ID offset to avoid conflicts
///    b. Import all objects with remapped IDs
///    c. Append pages to the destination
/// 5. Flatten the page tree, drop orphaned objects, compress
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>, LayoutError> {
    let mut documents = documents.into_iter();
    let first = documents
        .next()
        .ok_or_else(|| LayoutError::InvalidInput("No documents to merge".into()))?;

    let mut loaded_docs = Vec::new();
    for (i, doc_bytes) in documents.enumerate() {
        let doc = Document::load_mem(&doc_bytes).map_err(|e| {
            LayoutError::ParseError(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        loaded_docs.push(doc);
    }

    // Single document - return as-is
    if loaded_docs.is_empty() {
        return Ok(first);
    }

    let mut dest = Document::load_mem(&first)
        .map_err(|e| LayoutError::ParseError(format!("Failed to load document 0: {}", e)))?;
    let mut dest_max_id = dest.max_id;

    let mut dest_page_refs = get_page_references(&dest);

    for source in loaded_docs.into_iter() {
        // Get source pages before we start moving objects out
        let source_pages = get_page_references(&source);

        let id_offset = dest_max_id;

        let mut remapped_objects = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            remapped_objects.insert(new_id, remap_object_refs(object, id_offset));
        }
        dest.objects.extend(remapped_objects);

        for old_page_ref in source_pages {
            dest_page_refs.push((old_page_ref.0 + id_offset, old_page_ref.1));
        }

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;

    // Pages of the appended documents still point at their old parents, which
    // carry inherited attributes. Copy those down before re-parenting.
    for &page_id in &dest_page_refs {
        flatten_inherited_attributes(&mut dest, page_id)?;
    }
    update_page_tree(&mut dest, dest_page_refs)?;

    dest.prune_objects();
    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| LayoutError::OperationError(format!("Failed to save merged PDF: {}", e)))?;

    tracing::debug!(
        "Merged document: {} pages, {} bytes",
        dest.get_pages().len(),
        buffer.len()
    );

    Ok(buffer)
}

/// Rewrite the page tree so every page hangs directly off the root Pages node
///
/// Inherited attributes are copied onto each page first, so page geometry and
/// resources survive. Returns the root Pages id.
pub(crate) fn normalize_page_tree(doc: &mut Document) -> Result<ObjectId, LayoutError> {
    let page_refs = get_page_references(doc);
    for &page_id in &page_refs {
        flatten_inherited_attributes(doc, page_id)?;
    }
    update_page_tree(doc, page_refs)
}

/// Get all page object references from a document, in page order
fn get_page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Copy attributes the page inherits from its ancestors onto the page itself
fn flatten_inherited_attributes(doc: &mut Document, page_id: ObjectId) -> Result<(), LayoutError> {
    let mut inherited: Vec<(&str, Object)> = Vec::new();

    let mut parent = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Parent").and_then(Object::as_reference).ok());

    let mut depth = 0;
    while let Some(node_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            let already_found = inherited.iter().any(|(k, _)| *k == key);
            if already_found {
                continue;
            }
            if let Ok(value) = node.get(key.as_bytes()) {
                inherited.push((key, value.clone()));
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| LayoutError::OperationError(format!("Invalid page {:?}: {}", page_id, e)))?;

    for (key, value) in inherited {
        if !page.has(key.as_bytes()) {
            page.set(key, value);
        }
    }
    Ok(())
}

/// Resolve the id of the root Pages node through the trailer and catalog
pub(crate) fn pages_root_id(doc: &Document) -> Result<ObjectId, LayoutError> {
    let root_obj = doc
        .trailer
        .get(b"Root")
        .map_err(|_| LayoutError::OperationError("No Root in trailer".into()))?;

    let catalog_id = root_obj
        .as_reference()
        .map_err(|_| LayoutError::OperationError("Root is not a reference".into()))?;

    let catalog = doc
        .objects
        .get(&catalog_id)
        .ok_or_else(|| LayoutError::OperationError("Catalog not found".into()))?
        .as_dict()
        .map_err(|_| LayoutError::OperationError("Invalid catalog".into()))?;

    catalog
        .get(b"Pages")
        .map_err(|_| LayoutError::OperationError("No Pages in catalog".into()))?
        .as_reference()
        .map_err(|_| LayoutError::OperationError("Pages is not a reference".into()))
}

/// Point the root Pages node at `page_refs` and re-parent every page to it
fn update_page_tree(doc: &mut Document, page_refs: Vec<ObjectId>) -> Result<ObjectId, LayoutError> {
    let pages_id = pages_root_id(doc)?;

    for &page_id in &page_refs {
        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    if let Some(Object::Dictionary(ref mut pages_dict)) = doc.objects.get_mut(&pages_id) {
        let kids = page_refs
            .iter()
            .map(|&id| Object::Reference(id))
            .collect::<Vec<_>>();
        pages_dict.set("Kids", Object::Array(kids));
        pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
    } else {
        return Err(LayoutError::OperationError(
            "Invalid pages dictionary".into(),
        ));
    }

    Ok(pages_id)
}
