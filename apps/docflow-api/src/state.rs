//! Application state for the docflow API

use std::sync::Arc;

use anyhow::Result;
use docflow_pipeline::{
    CommandConverter, Converter, LocalMerger, LocalProtector, Merger, Orchestrator, Protector,
    RemoteConverter, RemoteMerger, RemoteProtector,
};

use crate::config::Args;

/// Collaborators shared by every request
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub protector: Arc<dyn Protector>,
    pub merger: Arc<dyn Merger>,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        protector: Arc<dyn Protector>,
        merger: Arc<dyn Merger>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            protector,
            merger,
        }
    }

    /// Wire local or remote capabilities according to `args`
    pub fn from_args(args: &Args) -> Result<Self> {
        let timeout = args.render_timeout();

        let converter: Arc<dyn Converter> = match &args.converter_url {
            Some(url) => {
                tracing::info!(%url, "using remote converter");
                Arc::new(RemoteConverter::new(url, timeout)?)
            }
            None => {
                tracing::info!(program = %args.renderer, "using local renderer");
                Arc::new(CommandConverter::new(args.renderer_config()))
            }
        };

        let protector: Arc<dyn Protector> = match &args.protector_url {
            Some(url) => {
                tracing::info!(%url, "using remote protector");
                Arc::new(RemoteProtector::new(url, timeout)?)
            }
            None => Arc::new(LocalProtector),
        };

        let merger: Arc<dyn Merger> = match &args.merger_url {
            Some(url) => {
                tracing::info!(%url, "using remote merger");
                Arc::new(RemoteMerger::new(url, timeout)?)
            }
            None => Arc::new(LocalMerger),
        };

        let orchestrator = Orchestrator::new(
            args.pipeline_config(),
            converter,
            protector.clone(),
            merger.clone(),
        );

        Ok(Self::new(orchestrator, protector, merger))
    }
}
