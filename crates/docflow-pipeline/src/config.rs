//! Pipeline configuration
//!
//! Built once at startup and passed into the orchestrator explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder replaced by the input document path in renderer arguments
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder replaced by the output PDF path in renderer arguments
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Where per-request scratch files live
#[derive(Debug, Clone)]
pub struct ScratchConfig {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl ScratchConfig {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Create both scratch directories if they do not exist yet
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self::new("uploads", "output")
    }
}

/// How the external renderer is invoked
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub program: String,
    /// Argument template; see [`INPUT_PLACEHOLDER`] and [`OUTPUT_PLACEHOLDER`]
    pub args: Vec<String>,
    /// Upper bound on a single renderer run
    pub timeout: Duration,
}

impl RendererConfig {
    /// Arguments with the placeholders substituted
    pub fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "pandoc".to_string(),
            args: vec![
                INPUT_PLACEHOLDER.to_string(),
                "-o".to_string(),
                OUTPUT_PLACEHOLDER.to_string(),
                "--pdf-engine=xelatex".to_string(),
            ],
            timeout: Duration::from_secs(120),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scratch: ScratchConfig,
    /// Accepted upload extensions, without the dot, matched case-insensitively
    pub accepted_extensions: Vec<String>,
    /// Renderer processes allowed to run at once for one batch
    pub max_parallel_conversions: usize,
}

impl PipelineConfig {
    pub fn new(scratch: ScratchConfig) -> Self {
        Self {
            scratch,
            ..Self::default()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch: ScratchConfig::default(),
            accepted_extensions: vec!["docx".to_string(), "doc".to_string()],
            max_parallel_conversions: 2,
        }
    }
}
