//! Document to PDF conversion
//!
//! The renderer is an external program (pandoc by default) invoked once per
//! document with an input and an output path. There is no retry here.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::RendererConfig;
use crate::error::ConvertError;
use crate::scratch::discard;

/// Keep error messages bounded when a renderer is chatty
const MAX_STDERR_BYTES: usize = 4096;

/// Converts one document on disk into one PDF on disk
///
/// After an error the caller must not trust anything at `output`.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

/// Runs the configured renderer as a child process
#[derive(Debug, Clone)]
pub struct CommandConverter {
    config: RendererConfig,
}

impl CommandConverter {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    async fn run(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        check_input(input).await?;

        let args = self.config.render_args(input, output);
        tracing::debug!(program = %self.config.program, ?args, "invoking renderer");

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future (timeout, cancelled request) kills the child
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let result = tokio::time::timeout(self.config.timeout, child.wait_with_output()).await;
        let finished = match result {
            Ok(finished) => finished?,
            Err(_elapsed) => return Err(ConvertError::Timeout(self.config.timeout)),
        };

        if !finished.status.success() {
            return Err(ConvertError::Failed {
                exit_code: finished.status.code(),
                stderr: tail_lossy(&finished.stderr),
            });
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(ConvertError::MissingOutput(output.to_path_buf())),
        }
    }
}

#[async_trait]
impl Converter for CommandConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let started = Instant::now();
        let result = self.run(input, output).await;

        match &result {
            Ok(()) => tracing::info!(
                input = %input.display(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "converted document"
            ),
            Err(e) => {
                tracing::warn!(input = %input.display(), error = %e, "conversion failed");
                discard(output).await;
            }
        }

        result
    }
}

/// The renderer gets a non-empty input file and an existing output directory
pub(crate) async fn check_input(input: &Path) -> Result<(), ConvertError> {
    match tokio::fs::metadata(input).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(ConvertError::EmptyInput(input.to_path_buf())),
    }
}

fn tail_lossy(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(MAX_STDERR_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn shell(script: &str, timeout: Duration) -> CommandConverter {
        CommandConverter::new(RendererConfig {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                script.into(),
                "renderer".into(),
                "{input}".into(),
                "{output}".into(),
            ],
            timeout,
        })
    }

    fn input_file(dir: &Path) -> std::path::PathBuf {
        let input = dir.join("in.docx");
        std::fs::write(&input, b"document body").unwrap();
        input
    }

    #[tokio::test]
    async fn test_successful_render_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let output = dir.path().join("out.pdf");

        let converter = shell(r#"cp "$1" "$2""#, Duration::from_secs(10));
        converter.convert(&input, &output).await.unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"document body");
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let output = dir.path().join("out.pdf");

        let converter = shell(
            r#"echo partial > "$2"; echo "unreadable document" >&2; exit 3"#,
            Duration::from_secs(10),
        );
        let err = converter.convert(&input, &output).await.unwrap_err();

        match err {
            ConvertError::Failed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "unreadable document");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!output.exists(), "partial output must be removed");
    }

    #[tokio::test]
    async fn test_zero_exit_without_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let output = dir.path().join("out.pdf");

        let converter = shell("exit 0", Duration::from_secs(10));
        let err = converter.convert(&input, &output).await.unwrap_err();

        assert!(matches!(err, ConvertError::MissingOutput(_)));
    }

    #[tokio::test]
    async fn test_slow_renderer_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let output = dir.path().join("out.pdf");

        let converter = shell("sleep 5", Duration::from_millis(200));
        let started = Instant::now();
        let err = converter.convert(&input, &output).await.unwrap_err();

        assert!(matches!(err, ConvertError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());

        let converter = CommandConverter::new(RendererConfig {
            program: "docflow-no-such-renderer".into(),
            args: vec![],
            timeout: Duration::from_secs(1),
        });
        let err = converter
            .convert(&input, &dir.path().join("out.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.docx");
        std::fs::write(&input, b"").unwrap();

        let converter = shell(r#"cp "$1" "$2""#, Duration::from_secs(10));
        let err = converter
            .convert(&input, &dir.path().join("out.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::EmptyInput(_)));
    }
}
