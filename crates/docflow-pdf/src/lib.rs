//! In-memory PDF transforms for the document pipeline
//!
//! This crate provides the two PDF operations the pipeline needs, both
//! working on byte buffers using lopdf:
//! - `merge_documents`: concatenate documents in order
//! - `protect_document`: password-encrypt a document

pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod merge;
pub mod protect;

pub use error::PdfError;
pub use merge::merge_documents;
pub use protect::protect_document;

/// Parse PDF bytes and return page count
pub fn page_count(bytes: &[u8]) -> Result<u32, PdfError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| PdfError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Cheap header sniff, used to reject obvious non-PDF payloads early
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}
