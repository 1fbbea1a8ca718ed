//! Typed client interfaces for the PDF capabilities
//!
//! The orchestrator only sees [`Protector`] and [`Merger`]. Whether the work
//! happens in this process or in another service is decided at startup.

use async_trait::async_trait;

use crate::error::ServiceError;

/// Applies password encryption to a PDF
///
/// `password` is never empty; callers skip protection instead.
#[async_trait]
pub trait Protector: Send + Sync {
    async fn protect(&self, pdf: Vec<u8>, password: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Concatenates PDFs in the given order
#[async_trait]
pub trait Merger: Send + Sync {
    async fn merge(&self, documents: Vec<Vec<u8>>) -> Result<Vec<u8>, ServiceError>;
}

/// Encrypts in-process on the blocking thread pool
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProtector;

#[async_trait]
impl Protector for LocalProtector {
    async fn protect(&self, pdf: Vec<u8>, password: &str) -> Result<Vec<u8>, ServiceError> {
        let password = password.to_owned();
        let protected =
            tokio::task::spawn_blocking(move || docflow_pdf::protect_document(&pdf, &password))
                .await
                .map_err(|e| ServiceError::Task(e.to_string()))??;
        Ok(protected)
    }
}

/// Merges in-process on the blocking thread pool
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalMerger;

#[async_trait]
impl Merger for LocalMerger {
    async fn merge(&self, documents: Vec<Vec<u8>>) -> Result<Vec<u8>, ServiceError> {
        let merged = tokio::task::spawn_blocking(move || docflow_pdf::merge_documents(documents))
            .await
            .map_err(|e| ServiceError::Task(e.to_string()))??;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_pdf::fixtures::{page_labels, sample_document};
    use docflow_pdf::PdfError;

    #[tokio::test]
    async fn test_local_merger_keeps_order() {
        let merged = LocalMerger
            .merge(vec![sample_document(1, "A"), sample_document(1, "B")])
            .await
            .unwrap();
        assert_eq!(page_labels(&merged), vec!["A-Page-1", "B-Page-1"]);
    }

    #[tokio::test]
    async fn test_local_merger_surfaces_pdf_errors() {
        let err = LocalMerger
            .merge(vec![sample_document(1, "A")])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Pdf(PdfError::NotEnoughDocuments(1))));
    }

    #[tokio::test]
    async fn test_local_protector_encrypts() {
        let protected = LocalProtector
            .protect(sample_document(1, "P"), "secret")
            .await
            .unwrap();
        let marker = b"/Encrypt";
        assert!(protected.windows(marker.len()).any(|w| w == marker));
    }

    #[tokio::test]
    async fn test_local_protector_rejects_garbage() {
        let err = LocalProtector
            .protect(b"not a pdf".to_vec(), "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Pdf(PdfError::ParseError(_))));
    }
}
