//! Error types for the pipeline and its collaborators

use std::path::PathBuf;
use std::time::Duration;

use docflow_pdf::PdfError;
use thiserror::Error;

/// Failure of a single renderer invocation
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("renderer exited with {}: {stderr}", describe_exit(.exit_code))]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("renderer did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("failed to start renderer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("input {} is missing or empty", .0.display())]
    EmptyInput(PathBuf),

    #[error("remote converter failed: {0}")]
    Remote(#[from] ServiceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Failure of a protect or merge call, local or remote
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error("remote service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("remote service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("worker task failed: {0}")]
    Task(String),
}

/// Batch failure, tagged with the stage that failed
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Conversion failed for {file}: {source}")]
    Conversion {
        file: String,
        #[source]
        source: ConvertError,
    },

    #[error("Password protection failed: {0}")]
    Protection(#[source] ServiceError),

    #[error("Merging failed: {0}")]
    Merge(#[source] ServiceError),

    #[error("Packaging failed: {0}")]
    Packaging(String),

    #[error("Scratch storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True when the request itself was bad, as opposed to a processing failure
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidFormat(_))
    }

    /// Short stable name of the failed stage
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::InvalidFormat(_) => "receiving",
            PipelineError::Conversion { .. } => "converting",
            PipelineError::Protection(_) => "protecting",
            PipelineError::Merge(_) => "merging",
            PipelineError::Packaging(_) => "packaging",
            PipelineError::Io(_) => "scratch",
        }
    }
}

impl From<zip::result::ZipError> for PipelineError {
    fn from(err: zip::result::ZipError) -> Self {
        PipelineError::Packaging(err.to_string())
    }
}
