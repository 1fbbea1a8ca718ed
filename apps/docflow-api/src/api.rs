//! API handlers for the docflow server
//!
//! - `POST /convert` (alias `/upload`): one document to one PDF
//! - `POST /bulk_convert`: many documents to a merged PDF or a zip
//! - `POST /merge` (alias `/merge_pdfs`): concatenate uploaded PDFs
//! - `POST /protect`: password-protect an uploaded PDF

use axum::{
    extract::{Multipart, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use docflow_pipeline::{base_name, BatchRequest};
use serde::Serialize;
use tracing::info;

use crate::body::{artifact_response, pdf_response};
use crate::error::ApiError;
use crate::state::AppState;
use crate::upload::{require_pdf, UploadForm};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// All routes, without middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/convert", post(handle_convert))
        .route("/upload", post(handle_convert))
        .route("/bulk_convert", post(handle_bulk_convert))
        .route("/merge", post(handle_merge))
        .route("/merge_pdfs", post(handle_merge))
        .route("/protect", post(handle_protect))
        .with_state(state)
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "docflow-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handler: POST /convert
pub async fn handle_convert(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (document, password) = UploadForm::parse(multipart).await?.single_file()?;
    info!(file = %document.file_name, "convert request");

    let outcome = state.orchestrator.convert_one(document, password).await?;
    artifact_response(outcome).await
}

/// Handler: POST /bulk_convert
pub async fn handle_bulk_convert(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::parse(multipart).await?;
    info!(files = form.files.len(), merge = form.merge, "bulk convert request");

    let request = BatchRequest {
        documents: form.files,
        password: form.password,
        merge: form.merge,
    };
    let outcome = state.orchestrator.convert_batch(request).await?;
    artifact_response(outcome).await
}

/// Handler: POST /merge
pub async fn handle_merge(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::parse(multipart).await?;
    if form.files.len() < 2 {
        return Err(ApiError::InvalidRequest(
            "Please upload at least two PDF files to merge.".into(),
        ));
    }
    for file in &form.files {
        require_pdf(file)?;
    }
    info!(files = form.files.len(), "merge request");

    let documents = form.files.into_iter().map(|file| file.content).collect();
    let merged = state.merger.merge(documents).await.map_err(ApiError::Merge)?;
    Ok(pdf_response(merged, "merged.pdf"))
}

/// Handler: POST /protect
pub async fn handle_protect(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (document, password) = UploadForm::parse(multipart).await?.single_file()?;
    require_pdf(&document)?;
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("A non-empty password is required.".into()))?;
    info!(file = %document.file_name, "protect request");

    let file_name = base_name(&document.file_name).to_string();
    let protected = state
        .protector
        .protect(document.content, &password)
        .await
        .map_err(ApiError::Protection)?;
    Ok(pdf_response(protected, &file_name))
}
