//! Batch orchestration
//!
//! A batch moves through these stages:
//!
//! ```text
//! RECEIVING -> CONVERTING -> [MERGING] -> [PROTECTING] -> PACKAGING -> DONE
//!      \            \             \              \              \
//!       `------------`-------------`--------------`--------------`--> FAILED
//! ```
//!
//! Any failure aborts the rest of the batch. Every scratch file the batch
//! created is tracked by its [`ScratchSpace`], which is released before an
//! error is returned, or handed to the caller with the finished artifact so
//! it can be released once the artifact has been delivered.
//!
//! When both a password and merge are requested, the documents are merged
//! first and only the merged result is encrypted.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::PipelineConfig;
use crate::convert::Converter;
use crate::error::PipelineError;
use crate::package::{archive_entry_name, unique_entry_names, write_archive};
use crate::scratch::ScratchSpace;
use crate::services::{Merger, Protector};
use crate::{extension_of, has_extension};

/// A file as received from the client
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

/// Documents in upload order plus processing options
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub documents: Vec<UploadedDocument>,
    /// Empty counts as absent
    pub password: Option<String>,
    pub merge: bool,
}

/// A converted document, still tied to its upload position
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub ordinal: usize,
    pub source_name: String,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Pdf,
    Zip,
}

impl ArtifactKind {
    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Pdf => "application/pdf",
            ArtifactKind::Zip => "application/zip",
        }
    }
}

/// The final output of a request, living in scratch storage
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Suggested download name
    pub file_name: String,
    pub path: PathBuf,
}

/// A finished artifact together with the scratch files backing it.
///
/// Dropping `scratch` deletes the artifact too, so keep it alive until the
/// artifact has been sent.
#[derive(Debug)]
pub struct BatchOutcome {
    pub artifact: Artifact,
    pub scratch: ScratchSpace,
}

/// An upload after it has been written to scratch storage
#[derive(Debug, Clone)]
struct PersistedUpload {
    ordinal: usize,
    source_name: String,
    input: PathBuf,
    output: PathBuf,
}

/// Drives uploads through conversion, protection, merging and packaging
pub struct Orchestrator {
    config: PipelineConfig,
    converter: Arc<dyn Converter>,
    protector: Arc<dyn Protector>,
    merger: Arc<dyn Merger>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        converter: Arc<dyn Converter>,
        protector: Arc<dyn Protector>,
        merger: Arc<dyn Merger>,
    ) -> Self {
        Self {
            config,
            converter,
            protector,
            merger,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Convert a single document and return it as one PDF
    pub async fn convert_one(
        &self,
        document: UploadedDocument,
        password: Option<String>,
    ) -> Result<BatchOutcome, PipelineError> {
        let mut scratch = ScratchSpace::new(&self.config.scratch)?;
        let password = normalize_password(password);

        let result = self
            .run_single(&mut scratch, document, password.as_deref())
            .await;
        finish(scratch, result).await
    }

    /// Convert a batch, then merge it into one PDF or bundle it as a zip
    pub async fn convert_batch(&self, request: BatchRequest) -> Result<BatchOutcome, PipelineError> {
        let mut scratch = ScratchSpace::new(&self.config.scratch)?;
        let password = normalize_password(request.password);
        let merge = request.merge;

        tracing::info!(
            request_id = %scratch.request_id(),
            files = request.documents.len(),
            merge,
            protect = password.is_some(),
            "batch received"
        );

        let result = self
            .run_batch(&mut scratch, request.documents, password.as_deref(), merge)
            .await;
        finish(scratch, result).await
    }

    async fn run_single(
        &self,
        scratch: &mut ScratchSpace,
        document: UploadedDocument,
        password: Option<&str>,
    ) -> Result<Artifact, PipelineError> {
        let uploads = self.receive(scratch, vec![document]).await?;
        let converted = self.convert_all(scratch, &uploads).await?;
        let first = converted
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Packaging("conversion produced nothing".into()))?;

        let path = match password {
            Some(password) => self.protect_file(scratch, &first, password).await?,
            None => first.output.clone(),
        };

        Ok(Artifact {
            kind: ArtifactKind::Pdf,
            file_name: archive_entry_name(&first.source_name),
            path,
        })
    }

    async fn run_batch(
        &self,
        scratch: &mut ScratchSpace,
        documents: Vec<UploadedDocument>,
        password: Option<&str>,
        merge: bool,
    ) -> Result<Artifact, PipelineError> {
        let uploads = self.receive(scratch, documents).await?;
        let converted = self.convert_all(scratch, &uploads).await?;

        if merge {
            self.merge_converted(scratch, &converted, password).await
        } else {
            self.archive_converted(scratch, &converted, password).await
        }
    }

    /// RECEIVING: validate everything first, then persist each upload
    async fn receive(
        &self,
        scratch: &mut ScratchSpace,
        documents: Vec<UploadedDocument>,
    ) -> Result<Vec<PersistedUpload>, PipelineError> {
        if documents.is_empty() {
            return Err(PipelineError::InvalidFormat("No files uploaded.".into()));
        }
        for document in &documents {
            self.validate(document)?;
        }

        let mut uploads = Vec::with_capacity(documents.len());
        for (ordinal, document) in documents.into_iter().enumerate() {
            let extension = extension_of(&document.file_name).unwrap_or_default();
            let input = scratch.upload_path(ordinal, extension);
            let output = scratch.converted_path(ordinal);
            tokio::fs::write(&input, &document.content).await?;

            uploads.push(PersistedUpload {
                ordinal,
                source_name: document.file_name,
                input,
                output,
            });
        }

        tracing::debug!(request_id = %scratch.request_id(), files = uploads.len(), "uploads persisted");
        Ok(uploads)
    }

    fn validate(&self, document: &UploadedDocument) -> Result<(), PipelineError> {
        if !has_extension(&document.file_name, &self.config.accepted_extensions) {
            let accepted = self
                .config
                .accepted_extensions
                .iter()
                .map(|ext| format!(".{}", ext))
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(PipelineError::InvalidFormat(format!(
                "Invalid file format: {}. Please upload a {} file.",
                document.file_name, accepted
            )));
        }
        if document.content.is_empty() {
            return Err(PipelineError::InvalidFormat(format!(
                "Empty upload: {}",
                document.file_name
            )));
        }
        Ok(())
    }

    /// CONVERTING: bounded concurrency, results in upload order.
    ///
    /// The first failure ends the stream; conversions still in flight are
    /// dropped, which kills their renderer processes.
    async fn convert_all(
        &self,
        scratch: &ScratchSpace,
        uploads: &[PersistedUpload],
    ) -> Result<Vec<ConversionResult>, PipelineError> {
        tracing::info!(request_id = %scratch.request_id(), files = uploads.len(), "converting");
        let limit = self.config.max_parallel_conversions.max(1);

        let converter = Arc::clone(&self.converter);
        stream::iter(uploads.to_vec())
            .map(move |upload| convert_upload(Arc::clone(&converter), upload))
            .buffered(limit)
            .try_collect()
            .await
    }

    /// MERGING then PROTECTING, packaged as a single PDF
    async fn merge_converted(
        &self,
        scratch: &mut ScratchSpace,
        converted: &[ConversionResult],
        password: Option<&str>,
    ) -> Result<Artifact, PipelineError> {
        tracing::info!(request_id = %scratch.request_id(), files = converted.len(), "merging");

        let mut documents = Vec::with_capacity(converted.len());
        for result in converted {
            documents.push(tokio::fs::read(&result.output).await?);
        }

        let mut merged = if documents.len() == 1 {
            // A one-document merge is that document
            documents.remove(0)
        } else {
            self.merger
                .merge(documents)
                .await
                .map_err(PipelineError::Merge)?
        };

        if let Some(password) = password {
            tracing::info!(request_id = %scratch.request_id(), "protecting merged document");
            merged = self
                .protector
                .protect(merged, password)
                .await
                .map_err(PipelineError::Protection)?;
        }

        tracing::info!(request_id = %scratch.request_id(), "packaging merged PDF");
        let path = scratch.merged_path();
        tokio::fs::write(&path, &merged).await?;

        Ok(Artifact {
            kind: ArtifactKind::Pdf,
            file_name: format!("merged_{}.pdf", scratch.request_id()),
            path,
        })
    }

    /// PROTECTING each document, then PACKAGING them as a zip
    async fn archive_converted(
        &self,
        scratch: &mut ScratchSpace,
        converted: &[ConversionResult],
        password: Option<&str>,
    ) -> Result<Artifact, PipelineError> {
        let mut sources = Vec::with_capacity(converted.len());
        if let Some(password) = password {
            tracing::info!(request_id = %scratch.request_id(), files = converted.len(), "protecting");
            for result in converted {
                sources.push(self.protect_file(scratch, result, password).await?);
            }
        } else {
            sources.extend(converted.iter().map(|result| result.output.clone()));
        }

        tracing::info!(request_id = %scratch.request_id(), "packaging archive");
        let names = unique_entry_names(converted.iter().map(|r| r.source_name.as_str()));
        let entries: Vec<(String, PathBuf)> = names.into_iter().zip(sources).collect();

        let path = scratch.archive_path();
        let archive_path = path.clone();
        tokio::task::spawn_blocking(move || write_archive(&archive_path, &entries))
            .await
            .map_err(|e| PipelineError::Packaging(e.to_string()))??;

        Ok(Artifact {
            kind: ArtifactKind::Zip,
            file_name: format!("converted_pdfs_{}.zip", scratch.request_id()),
            path,
        })
    }

    /// Encrypt one converted PDF into its own scratch file
    async fn protect_file(
        &self,
        scratch: &mut ScratchSpace,
        result: &ConversionResult,
        password: &str,
    ) -> Result<PathBuf, PipelineError> {
        let pdf = tokio::fs::read(&result.output).await?;
        let protected = self
            .protector
            .protect(pdf, password)
            .await
            .map_err(PipelineError::Protection)?;

        let path = scratch.protected_path(result.ordinal);
        tokio::fs::write(&path, protected).await?;
        Ok(path)
    }
}

async fn convert_upload(
    converter: Arc<dyn Converter>,
    upload: PersistedUpload,
) -> Result<ConversionResult, PipelineError> {
    converter
        .convert(&upload.input, &upload.output)
        .await
        .map_err(|source| PipelineError::Conversion {
            file: upload.source_name.clone(),
            source,
        })?;

    Ok(ConversionResult {
        ordinal: upload.ordinal,
        source_name: upload.source_name,
        output: upload.output,
    })
}

fn normalize_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}

/// DONE hands the scratch space to the caller; FAILED releases it here
async fn finish(
    scratch: ScratchSpace,
    result: Result<Artifact, PipelineError>,
) -> Result<BatchOutcome, PipelineError> {
    match result {
        Ok(artifact) => {
            tracing::info!(
                request_id = %scratch.request_id(),
                artifact = %artifact.file_name,
                "batch done"
            );
            Ok(BatchOutcome { artifact, scratch })
        }
        Err(err) => {
            let request_id = scratch.request_id();
            let removed = scratch.close().await;
            tracing::warn!(
                request_id = %request_id,
                stage = err.stage(),
                error = %err,
                removed,
                "batch failed"
            );
            Err(err)
        }
    }
}
