//! PDF Merge algorithm
//!
//! Concatenates several PDFs into a single document, keeping input order.

use crate::error::PdfError;
use lopdf::{Document, Object, ObjectId};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards against cyclic `Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 64;

/// Merge multiple PDFs into one
///
/// All pages of document 0 come first, then all pages of document 1, and so
/// on, each in their original order. Fails without producing output if any
/// input does not parse.
///
/// The algorithm:
/// 1. Reject fewer than two inputs
/// 2. Load every document, copying inherited page attributes onto the pages
/// 3. Use the first document as the destination
/// 4. For each further document, shift its object IDs past the destination's
///    highest ID and import all of its objects
/// 5. Rebuild the destination page tree as one flat list in input order
/// 6. Drop unreachable objects, compress and serialize
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfError> {
    if documents.len() < 2 {
        return Err(PdfError::NotEnoughDocuments(documents.len()));
    }

    // Load all documents first so a bad input fails before any work is done
    let mut loaded_docs = Vec::with_capacity(documents.len());
    for (i, doc_bytes) in documents.iter().enumerate() {
        let mut doc = Document::load_mem(doc_bytes)
            .map_err(|e| PdfError::ParseError(format!("document {}: {}", i, e)))?;
        if doc.get_pages().is_empty() {
            return Err(PdfError::ParseError(format!("document {} has no pages", i)));
        }
        materialize_inherited(&mut doc);
        loaded_docs.push(doc);
    }

    let mut dest = loaded_docs.remove(0);
    let mut dest_max_id = dest.max_id;
    let mut dest_page_refs = page_references(&dest);

    for source in loaded_docs {
        let source_pages = page_references(&source);
        let id_offset = dest_max_id;

        for (old_id, object) in source.objects {
            let new_id = (old_id.0 + id_offset, old_id.1);
            dest.objects
                .insert(new_id, remap_object_refs(object, id_offset));
        }

        dest_page_refs.extend(
            source_pages
                .into_iter()
                .map(|(id, generation)| (id + id_offset, generation)),
        );

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;
    update_page_tree(&mut dest, &dest_page_refs)?;
    dest.prune_objects();

    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| PdfError::OperationError(format!("Failed to save merged PDF: {}", e)))?;

    tracing::debug!(
        pages = dest_page_refs.len(),
        bytes = buffer.len(),
        "merged documents"
    );

    Ok(buffer)
}

/// Page object references in page order
fn page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Copy attributes each page inherits from its ancestors onto the page itself.
///
/// The merged page tree is flat, so anything a page used to pick up from an
/// intermediate `Pages` node would otherwise be lost.
fn materialize_inherited(doc: &mut Document) {
    for page_id in page_references(doc) {
        let Ok(page) = doc.get_dictionary(page_id) else {
            continue;
        };

        let mut missing: Vec<&[u8]> = INHERITABLE_KEYS
            .iter()
            .copied()
            .filter(|key| !page.has(key))
            .collect();
        let mut inherited = Vec::new();
        let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            if missing.is_empty() || depth >= MAX_TREE_DEPTH {
                break;
            }
            let Ok(node) = doc.get_dictionary(parent_id) else {
                break;
            };
            missing.retain(|key| match node.get(key) {
                Ok(value) => {
                    inherited.push((key.to_vec(), value.clone()));
                    false
                }
                Err(_) => true,
            });
            parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
            depth += 1;
        }

        if inherited.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            for (key, value) in inherited {
                page.set(key, value);
            }
        }
    }
}

/// Recursively shift object references by `offset`
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
                let taken = std::mem::replace(value, Object::Null);
                *value = remap_object_refs(taken, offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                let taken = std::mem::replace(value, Object::Null);
                *value = remap_object_refs(taken, offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the destination catalog's page tree at `page_refs`, in order
fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), PdfError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|_| PdfError::OperationError("No Root reference in trailer".into()))?;

    let pages_id = doc
        .get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(|pages| pages.as_reference())
        .map_err(|_| PdfError::OperationError("Catalog has no Pages reference".into()))?;

    let Some(Object::Dictionary(pages_dict)) = doc.objects.get_mut(&pages_id) else {
        return Err(PdfError::OperationError(
            "Invalid pages dictionary".into(),
        ));
    };

    let kids = page_refs
        .iter()
        .map(|&id| Object::Reference(id))
        .collect::<Vec<_>>();
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(page_refs.len() as i64));

    // Every page now hangs directly off the root
    let mut dangling = 0usize;
    for &page_id in page_refs {
        match doc.objects.get_mut(&page_id) {
            Some(Object::Dictionary(page)) => page.set("Parent", Object::Reference(pages_id)),
            _ => dangling += 1,
        }
    }
    if dangling > 0 {
        return Err(PdfError::OperationError(format!(
            "{} page reference(s) do not resolve to a page dictionary",
            dangling
        )));
    }

    Ok(())
}
