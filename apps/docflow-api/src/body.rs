//! Download responses
//!
//! Artifacts produced by the pipeline are streamed from scratch storage by a
//! body that owns the request's [`ScratchSpace`]. The scratch files go away
//! when the body is dropped: after the last chunk, or as soon as the client
//! disconnects.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use docflow_pipeline::{BatchOutcome, ScratchSpace};
use futures::stream;
use std::io;
use tokio::{fs::File, io::AsyncReadExt};

use crate::error::ApiError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Streaming state; `file` is declared first so it closes before cleanup
struct Download {
    file: File,
    scratch: ScratchSpace,
}

/// Stream a finished artifact and release its scratch files afterwards
pub async fn artifact_response(outcome: BatchOutcome) -> Result<Response, ApiError> {
    let BatchOutcome { artifact, scratch } = outcome;

    let file = File::open(&artifact.path)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot open artifact: {}", e)))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("cannot stat artifact: {}", e)))?
        .len();

    let body = stream::unfold(Some(Download { file, scratch }), next_chunk);

    let mut response = attachment(
        Body::from_stream(body),
        artifact.kind.content_type(),
        &artifact.file_name,
    );
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}

/// Read the next chunk. At the end of the file the scratch space is closed
/// before the stream finishes; a body dropped early cleans up on drop.
async fn next_chunk(
    state: Option<Download>,
) -> Option<(io::Result<Bytes>, Option<Download>)> {
    let Download { mut file, scratch } = state?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    match file.read(&mut buf).await {
        Ok(0) => {
            drop(file);
            scratch.close().await;
            None
        }
        Ok(n) => {
            buf.truncate(n);
            Some((Ok(Bytes::from(buf)), Some(Download { file, scratch })))
        }
        Err(e) => Some((Err(e), None)),
    }
}

/// In-memory PDF download
pub fn pdf_response(bytes: Vec<u8>, file_name: &str) -> Response {
    attachment(Body::from(bytes), "application/pdf", file_name)
}

fn attachment(body: Body, content_type: &'static str, file_name: &str) -> Response {
    let disposition = content_disposition(file_name);
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// `attachment; filename="..."` with characters unsafe in a quoted header
/// value replaced
pub fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}
