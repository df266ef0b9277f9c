//! Server binary for pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig`, starts the retention sweep, and serves the axum router.

use anyhow::{Context, Result};
use clap::Parser;
use pdf2img::{router, spawn_periodic_sweep, AppState, ServiceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port with defaults (pdftoppm from PATH)
  pdf2img

  # Production-ish: dedicated volume, shorter retention
  pdf2img --workspace-root /var/lib/pdf2img --retention 900

  # Point at a specific poppler build
  pdf2img --engine /opt/poppler/bin/pdftoppm

ENDPOINTS:
  POST   /pdf-to-images?fmt={png|jpeg}&dpi={72..600}   multipart field "pdf"
  GET    /download/{job_id}/{filename}
  DELETE /cleanup/{job_id}
  GET    /health

SETUP:
  The rasterization engine is poppler's pdftoppm:
    debian/ubuntu:  apt install poppler-utils
    macOS:          brew install poppler
"#;

/// Convert PDF pages to images over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "HTTP service converting PDF pages to images for OCR",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "PDF2IMG_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Root directory for per-job workspaces.
    #[arg(long, env = "PDF2IMG_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Rasterization engine binary.
    #[arg(long, env = "PDF2IMG_ENGINE", default_value = "pdftoppm")]
    engine: PathBuf,

    /// Wall-clock ceiling for one engine invocation, in seconds.
    #[arg(long, env = "PDF2IMG_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// JPEG quality for fmt=jpeg (1-100).
    #[arg(long, env = "PDF2IMG_JPEG_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Purge job workspaces older than this many seconds.
    #[arg(long, env = "PDF2IMG_RETENTION", default_value_t = 3600)]
    retention: u64,

    /// Seconds between background purge sweeps.
    #[arg(long, env = "PDF2IMG_SWEEP_INTERVAL", default_value_t = 300)]
    sweep_interval: u64,

    /// Maximum upload size in bytes.
    #[arg(long, env = "PDF2IMG_MAX_UPLOAD", default_value_t = 50 * 1024 * 1024)]
    max_upload: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = ServiceConfig::builder()
        .engine_binary(&cli.engine)
        .engine_timeout_secs(cli.timeout)
        .jpeg_quality(cli.jpeg_quality)
        .retention_secs(cli.retention)
        .sweep_interval_secs(cli.sweep_interval)
        .max_upload_bytes(cli.max_upload);
    if let Some(ref root) = cli.workspace_root {
        builder = builder.workspace_root(root);
    }
    let config = builder.build().context("Invalid configuration")?;

    let state = Arc::new(AppState::new(config.clone()).context("Failed to initialise service")?);

    if !state.engine.is_available().await {
        tracing::warn!(
            engine = %config.engine_binary.display(),
            "Rasterization engine probe failed — conversions will error until it is installed"
        );
    }

    // ── Background retention sweep ───────────────────────────────────────
    spawn_periodic_sweep(
        state.workspaces.clone(),
        config.sweep_interval(),
        config.retention(),
    );

    // ── Serve ────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    tracing::info!(
        addr = %cli.bind,
        workspace_root = %config.workspace_root.display(),
        "pdf2img listening"
    );

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}
