//! Command-line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use docflow_pipeline::{PipelineConfig, RendererConfig, ScratchConfig};

/// Command-line arguments for the docflow API server
#[derive(Parser, Debug, Clone)]
#[command(name = "docflow-api")]
#[command(about = "Convert office documents to PDF, merge and password-protect them")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "DOCFLOW_PORT", default_value = "8000")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "DOCFLOW_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Directory for received uploads
    #[arg(long, env = "DOCFLOW_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Directory for converted and packaged output
    #[arg(long, env = "DOCFLOW_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Renderer program
    #[arg(long, env = "DOCFLOW_RENDERER", default_value = "pandoc")]
    pub renderer: String,

    /// Renderer arguments, `{input}` and `{output}` are substituted
    #[arg(
        long,
        env = "DOCFLOW_RENDERER_ARGS",
        value_delimiter = ' ',
        allow_hyphen_values = true,
        default_value = "{input} -o {output} --pdf-engine=xelatex"
    )]
    pub renderer_args: Vec<String>,

    /// Seconds before a renderer run is killed
    #[arg(long, env = "DOCFLOW_RENDER_TIMEOUT_SECS", default_value = "120")]
    pub render_timeout_secs: u64,

    /// Renderer processes allowed at once per batch
    #[arg(long, env = "DOCFLOW_MAX_PARALLEL_CONVERSIONS", default_value = "2")]
    pub max_parallel_conversions: usize,

    /// Request body limit in megabytes
    #[arg(long, env = "DOCFLOW_MAX_UPLOAD_MB", default_value = "100")]
    pub max_upload_mb: usize,

    /// Convert on another docflow instance instead of running the renderer here
    #[arg(long, env = "DOCFLOW_CONVERTER_URL")]
    pub converter_url: Option<String>,

    /// Protect PDFs on another docflow instance
    #[arg(long, env = "DOCFLOW_PROTECTOR_URL")]
    pub protector_url: Option<String>,

    /// Merge PDFs on another docflow instance
    #[arg(long, env = "DOCFLOW_MERGER_URL")]
    pub merger_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn scratch_config(&self) -> ScratchConfig {
        ScratchConfig::new(&self.upload_dir, &self.output_dir)
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            program: self.renderer.clone(),
            args: self
                .renderer_args
                .iter()
                .filter(|arg| !arg.is_empty())
                .cloned()
                .collect(),
            timeout: self.render_timeout(),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_parallel_conversions: self.max_parallel_conversions.max(1),
            ..PipelineConfig::new(self.scratch_config())
        }
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn body_limit(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
