//! Document conversion pipeline
//!
//! Turns uploaded office documents into PDFs with an external renderer,
//! optionally password-protects and merges them, and packages the result
//! as a single PDF or a zip archive.
//!
//! ## Components
//!
//! - [`convert`]: the external renderer behind the [`Converter`] trait
//! - [`services`]: [`Protector`] and [`Merger`] client traits with in-process
//!   implementations; [`remote`] has the HTTP-backed ones
//! - [`scratch`]: per-request scratch files, deleted when the guard drops
//! - [`orchestrator`]: drives a batch through every stage

pub mod config;
pub mod convert;
pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod orchestrator;
pub mod package;
pub mod remote;
pub mod scratch;
pub mod services;

pub use config::{PipelineConfig, RendererConfig, ScratchConfig};
pub use convert::{CommandConverter, Converter};
pub use error::{ConvertError, PipelineError, ServiceError};
pub use orchestrator::{
    Artifact, ArtifactKind, BatchOutcome, BatchRequest, ConversionResult, Orchestrator,
    UploadedDocument,
};
pub use remote::{RemoteConverter, RemoteMerger, RemoteProtector};
pub use scratch::ScratchSpace;
pub use services::{LocalMerger, LocalProtector, Merger, Protector};

/// Whether `file_name` ends in one of `extensions` (case-insensitive)
pub fn has_extension(file_name: &str, extensions: &[String]) -> bool {
    extension_of(file_name)
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Extension of the last path segment, without the dot
pub fn extension_of(file_name: &str) -> Option<&str> {
    let base = base_name(file_name);
    match base.rfind('.') {
        Some(0) | None => None,
        Some(i) if i + 1 < base.len() => Some(&base[i + 1..]),
        Some(_) => None,
    }
}

/// Last segment of a client-supplied path, accepting both separators
pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office() -> Vec<String> {
        vec!["docx".to_string(), "doc".to_string()]
    }

    #[test]
    fn test_has_extension_is_case_insensitive() {
        assert!(has_extension("report.docx", &office()));
        assert!(has_extension("REPORT.DOC", &office()));
        assert!(has_extension("dir/sub/letter.Docx", &office()));
    }

    #[test]
    fn test_has_extension_rejects_others() {
        assert!(!has_extension("report.pdf", &office()));
        assert!(!has_extension("docx", &office()));
        assert!(!has_extension(".docx", &office()));
        assert!(!has_extension("report.", &office()));
        assert!(!has_extension("report.docx.exe", &office()));
    }

    #[test]
    fn test_base_name_strips_directories() {
        assert_eq!(base_name("a/b/c.docx"), "c.docx");
        assert_eq!(base_name(r"C:\Users\me\c.doc"), "c.doc");
        assert_eq!(base_name("plain.doc"), "plain.doc");
    }
}
