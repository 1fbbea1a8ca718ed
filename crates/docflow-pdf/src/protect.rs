//! Password protection
//!
//! Encrypts a document with the standard security handler (RC4, 128-bit
//! key). User and owner password are the same, so the password is needed
//! to open the file at all.

use crate::error::PdfError;
use lopdf::{Document, EncryptionState, EncryptionVersion, Object, Permissions, StringFormat};

/// Key length in bits for the encryption dictionary
const KEY_LENGTH_BITS: usize = 128;

/// Encrypt `pdf` with `password`
///
/// Every page and object of the source is kept as-is; only the serialized
/// form is encrypted. An empty password is a caller error.
pub fn protect_document(pdf: &[u8], password: &str) -> Result<Vec<u8>, PdfError> {
    if password.is_empty() {
        return Err(PdfError::EmptyPassword);
    }

    let mut doc = Document::load_mem(pdf).map_err(|e| PdfError::ParseError(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(PdfError::AlreadyEncrypted);
    }
    if doc.get_pages().is_empty() {
        return Err(PdfError::ParseError("document has no pages".into()));
    }

    ensure_file_id(&mut doc);

    let version = EncryptionVersion::V2 {
        document: &doc,
        owner_password: password,
        user_password: password,
        key_length: KEY_LENGTH_BITS,
        permissions: Permissions::all(),
    };
    let state =
        EncryptionState::try_from(version).map_err(|e| PdfError::EncryptionError(e.to_string()))?;

    doc.encrypt(&state)
        .map_err(|e| PdfError::EncryptionError(e.to_string()))?;

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfError::EncryptionError(format!("Failed to save protected PDF: {}", e)))?;

    tracing::debug!(bytes = buffer.len(), "protected document");

    Ok(buffer)
}

/// The encryption key is derived from the first file identifier, so the
/// trailer must carry one.
fn ensure_file_id(doc: &mut Document) {
    if doc.trailer.has(b"ID") {
        return;
    }
    let id = uuid::Uuid::new_v4().as_bytes().to_vec();
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{labels_of, open_with_password, page_labels, sample_document};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_protect_rejects_empty_password() {
        let pdf = sample_document(1, "Plain");
        assert!(matches!(
            protect_document(&pdf, ""),
            Err(PdfError::EmptyPassword)
        ));
    }

    #[test]
    fn test_protect_rejects_corrupt_input() {
        let result = protect_document(b"%PDF-1.7\nthis is not a real document", "secret");
        assert!(matches!(result, Err(PdfError::ParseError(_))));
    }

    #[test]
    fn test_protected_output_has_encrypt_dictionary() {
        let pdf = sample_document(2, "Enc");
        let protected = protect_document(&pdf, "secret").unwrap();

        assert!(protected.starts_with(b"%PDF-"));
        let marker = b"/Encrypt";
        assert!(
            protected.windows(marker.len()).any(|w| w == marker),
            "trailer should reference an encryption dictionary"
        );
    }

    #[test]
    fn test_protected_output_hides_page_content() {
        let pdf = sample_document(1, "VisibleLabel");
        let protected = protect_document(&pdf, "secret").unwrap();

        let needle = b"VisibleLabel-Page-1";
        assert!(pdf.windows(needle.len()).any(|w| w == needle));
        assert!(!protected.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_open_with_password_yields_same_pages() {
        let pdf = sample_document(3, "Secret");
        let protected = protect_document(&pdf, "secret").unwrap();

        let doc = open_with_password(&protected, "secret").unwrap();
        assert_eq!(labels_of(&doc), page_labels(&pdf));
    }

    #[test]
    fn test_open_with_wrong_password_fails() {
        let pdf = sample_document(1, "Locked");
        let protected = protect_document(&pdf, "secret").unwrap();

        assert!(open_with_password(&protected, "not-the-password").is_err());
    }

    #[test]
    fn test_protect_twice_is_rejected() {
        let pdf = sample_document(1, "Twice");
        let protected = protect_document(&pdf, "secret").unwrap();

        let again = protect_document(&protected, "secret");
        assert!(again.is_err());
    }
}
