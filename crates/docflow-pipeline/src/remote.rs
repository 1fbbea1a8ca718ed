//! HTTP clients for capabilities hosted by another docflow instance
//!
//! Each client posts a multipart form to the matching endpoint. A non-2xx
//! response and a transport failure are both errors; nothing is skipped.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::convert::{check_input, Converter};
use crate::error::{ConvertError, ServiceError};
use crate::scratch::discard;
use crate::services::{Merger, Protector};

const PDF_MIME: &str = "application/pdf";

/// Error body produced by docflow's HTTP API
#[derive(Deserialize)]
struct RemoteErrorBody {
    error: String,
}

/// Base URL plus a shared connection pool
#[derive(Debug, Clone)]
struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, form: Form) -> Result<Vec<u8>, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "calling remote service");

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<RemoteErrorBody>(&body)
                .map(|parsed| parsed.error)
                .unwrap_or(body);
            return Err(ServiceError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

fn pdf_part(bytes: Vec<u8>, file_name: String) -> Result<Part, ServiceError> {
    Ok(Part::bytes(bytes).file_name(file_name).mime_str(PDF_MIME)?)
}

/// Protector backed by `POST {base}/protect`
#[derive(Debug, Clone)]
pub struct RemoteProtector {
    inner: ServiceClient,
}

impl RemoteProtector {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            inner: ServiceClient::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl Protector for RemoteProtector {
    async fn protect(&self, pdf: Vec<u8>, password: &str) -> Result<Vec<u8>, ServiceError> {
        let form = Form::new()
            .part("file", pdf_part(pdf, "document.pdf".to_string())?)
            .text("password", password.to_owned());
        self.inner.post("/protect", form).await
    }
}

/// Merger backed by `POST {base}/merge`
#[derive(Debug, Clone)]
pub struct RemoteMerger {
    inner: ServiceClient,
}

impl RemoteMerger {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            inner: ServiceClient::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl Merger for RemoteMerger {
    async fn merge(&self, documents: Vec<Vec<u8>>) -> Result<Vec<u8>, ServiceError> {
        let mut form = Form::new();
        // Multipart order is the merge order
        for (i, document) in documents.into_iter().enumerate() {
            form = form.part("files", pdf_part(document, format!("{:04}.pdf", i))?);
        }
        self.inner.post("/merge", form).await
    }
}

/// Converter backed by `POST {base}/convert`
#[derive(Debug, Clone)]
pub struct RemoteConverter {
    inner: ServiceClient,
}

impl RemoteConverter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            inner: ServiceClient::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl Converter for RemoteConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        check_input(input).await?;

        let file_name = input
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.docx".to_string());
        let content = tokio::fs::read(input).await?;
        let form = Form::new().part("file", Part::bytes(content).file_name(file_name));

        let pdf = self.inner.post("/convert", form).await?;
        if let Err(e) = tokio::fs::write(output, &pdf).await {
            discard(output).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ServiceClient::new("http://merge:8002/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://merge:8002");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let protector = RemoteProtector::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = protector
            .protect(b"%PDF-1.5".to_vec(), "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
    }
}
