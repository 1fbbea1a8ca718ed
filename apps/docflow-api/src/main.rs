//! docflow API server
//!
//! Converts uploaded office documents to PDF with an external renderer, and
//! merges and password-protects PDFs. Provides REST endpoints for:
//!
//! - Single and bulk conversion (optionally merged and/or protected)
//! - PDF merging
//! - PDF password protection
//!
//! ## Topology
//!
//! By default every capability runs in this process. Pointing
//! `--converter-url`, `--protector-url` or `--merger-url` at other docflow
//! instances splits the work across services instead.

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod body;
mod config;
mod error;
mod state;
mod upload;

use config::Args;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting docflow API on {}:{}", args.host, args.port);

    let scratch = args.scratch_config();
    scratch.ensure_dirs()?;
    info!(
        upload_dir = %scratch.upload_dir.display(),
        output_dir = %scratch.output_dir.display(),
        "scratch directories ready"
    );

    let state = AppState::from_args(&args)?;

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state)
        .layer(DefaultBodyLimit::max(args.body_limit()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Max parallel conversions: {}", args.max_parallel_conversions);
    info!("Render timeout: {}s", args.render_timeout_secs);

    axum::serve(listener, app).await?;

    Ok(())
}
