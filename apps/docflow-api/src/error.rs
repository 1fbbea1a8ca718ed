//! Error types for the docflow API

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docflow_pdf::PdfError;
use docflow_pipeline::{PipelineError, ServiceError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Password protection failed: {0}")]
    Protection(ServiceError),

    #[error("Merging failed: {0}")]
    Merge(ServiceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Protection(err) | ApiError::Merge(err) if is_bad_pdf(err) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Multipart(_) => "MALFORMED_UPLOAD",
            ApiError::Pipeline(err) => match err {
                PipelineError::InvalidFormat(_) => "INVALID_FORMAT",
                PipelineError::Conversion { .. } => "CONVERSION_FAILED",
                PipelineError::Protection(_) => "PROTECTION_FAILED",
                PipelineError::Merge(_) => "MERGE_FAILED",
                PipelineError::Packaging(_) => "PACKAGING_FAILED",
                PipelineError::Io(_) => "INTERNAL_ERROR",
            },
            ApiError::Protection(_) => "PROTECTION_FAILED",
            ApiError::Merge(_) => "MERGE_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// A PDF the client sent that could not be used as-is, whether rejected
/// here or by a remote service answering with a 4xx
fn is_bad_pdf(err: &ServiceError) -> bool {
    match err {
        ServiceError::Pdf(pdf) => matches!(
            pdf,
            PdfError::ParseError(_)
                | PdfError::AlreadyEncrypted
                | PdfError::EmptyPassword
                | PdfError::NotEnoughDocuments(_)
        ),
        ServiceError::Remote { status, .. } => (400..500).contains(status),
        _ => false,
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "request failed: {}", self);
        } else {
            tracing::debug!(code = self.code(), "request rejected: {}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_pipeline::ConvertError;
    use std::time::Duration;

    #[test]
    fn test_invalid_format_is_bad_request() {
        let err = ApiError::from(PipelineError::InvalidFormat("a.txt".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_FORMAT");
    }

    #[test]
    fn test_stage_failures_are_server_errors() {
        let conversion = ApiError::from(PipelineError::Conversion {
            file: "a.docx".into(),
            source: ConvertError::Timeout(Duration::from_secs(1)),
        });
        assert_eq!(conversion.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(conversion.code(), "CONVERSION_FAILED");

        let merge = ApiError::from(PipelineError::Merge(ServiceError::Remote {
            status: 502,
            message: "down".into(),
        }));
        assert_eq!(merge.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(merge.to_string().contains("Merging failed"));
    }

    #[test]
    fn test_unparseable_client_pdf_is_bad_request() {
        let err = ApiError::Protection(ServiceError::Pdf(PdfError::ParseError("junk".into())));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::Merge(ServiceError::Task("panicked".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_remote_rejection_keeps_client_status() {
        let rejected = ApiError::Merge(ServiceError::Remote {
            status: 400,
            message: "Invalid PDF".into(),
        });
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejected.code(), "MERGE_FAILED");

        let rejected = ApiError::Protection(ServiceError::Remote {
            status: 422,
            message: "encrypted".into(),
        });
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let unavailable = ApiError::Merge(ServiceError::Remote {
            status: 503,
            message: "busy".into(),
        });
        assert_eq!(unavailable.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
