use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("At least two documents are required to merge, got {0}")]
    NotEnoughDocuments(usize),

    #[error("Password must not be empty")]
    EmptyPassword,

    #[error("PDF is already encrypted")]
    AlreadyEncrypted,

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}
