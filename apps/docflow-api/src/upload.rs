//! Multipart form parsing shared by the upload endpoints

use axum::extract::Multipart;
use docflow_pipeline::UploadedDocument;

use crate::error::ApiError;

/// Fields recognised across all upload endpoints
#[derive(Debug, Default)]
pub struct UploadForm {
    /// Files in the order the client sent them
    pub files: Vec<UploadedDocument>,
    pub password: Option<String>,
    pub merge: bool,
}

impl UploadForm {
    /// Read every field of the form. Unknown fields are skipped.
    pub async fn parse(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" | "files" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content = field.bytes().await?;
                    // Browsers send an empty part when no file was picked
                    if file_name.is_empty() && content.is_empty() {
                        continue;
                    }
                    form.files.push(UploadedDocument::new(file_name, content.to_vec()));
                }
                "password" => {
                    form.password = Some(field.text().await?);
                }
                "merge" => {
                    let value = field.text().await?;
                    form.merge = parse_bool(&value).ok_or_else(|| {
                        ApiError::InvalidRequest(format!("Invalid merge flag: {}", value))
                    })?;
                }
                other => {
                    tracing::debug!(field = other, "ignoring unknown form field");
                }
            }
        }

        Ok(form)
    }

    /// Exactly one file, or a 400 naming what went wrong
    pub fn single_file(mut self) -> Result<(UploadedDocument, Option<String>), ApiError> {
        match self.files.len() {
            0 => Err(ApiError::InvalidRequest("No file uploaded.".into())),
            1 => Ok((self.files.remove(0), self.password)),
            n => Err(ApiError::InvalidRequest(format!(
                "Expected one file, got {}.",
                n
            ))),
        }
    }
}

/// HTML-form style boolean; empty means false
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Reject anything not named `*.pdf`
pub fn require_pdf(document: &UploadedDocument) -> Result<(), ApiError> {
    if !docflow_pipeline::has_extension(&document.file_name, &["pdf".to_string()]) {
        return Err(ApiError::InvalidRequest(format!(
            "Invalid file format: {}. Please upload a PDF file.",
            document.file_name
        )));
    }
    if !docflow_pdf::looks_like_pdf(&document.content) {
        return Err(ApiError::InvalidRequest(format!(
            "{} is not a PDF document",
            document.file_name
        )));
    }
    Ok(())
}
