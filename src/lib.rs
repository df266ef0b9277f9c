//! # pdf2img
//!
//! Convert PDF documents into one raster image per page, packaged as an
//! HTTP service for downstream OCR pipelines.
//!
//! ## Why this crate?
//!
//! OCR engines want images, not PDFs. This service accepts an uploaded PDF,
//! invokes poppler's `pdftoppm` with bounded resources, and serves the
//! resulting `page-<n>.png` / `page-<n>.jpg` files back through a simple
//! retrieval protocol with explicit cleanup semantics. The hard part is not
//! rendering — the engine does that — but managing many concurrent,
//! isolated, disk-backed jobs safely under untrusted input.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Validate   format ∈ {png, jpeg}, dpi ∈ [72, 600], %PDF magic
//!  ├─ 2. Workspace  fresh UUID-named directory, exclusively owned
//!  ├─ 3. Rasterize  pdftoppm subprocess, wall-clock timeout
//!  ├─ 4. Normalize  engine output → page-1.ext … page-N.ext
//!  ├─ 5. Manifest   {job_id, count, files, download_base}
//!  └─ 6. Retrieve   streamed downloads until cleanup or retention purge
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2img::{convert, PdftoppmEngine, ServiceConfig, WorkspaceManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::default();
//!     let workspaces = WorkspaceManager::new(&config.workspace_root)?;
//!     let engine = PdftoppmEngine::from_config(&config);
//!
//!     let pdf = std::fs::read("document.pdf")?;
//!     let manifest = convert(&workspaces, &engine, "document.pdf", &pdf, "png", 300).await?;
//!     println!("{} pages: {:?}", manifest.count, manifest.files);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router and the `pdf2img` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `server` when embedding only the conversion pipeline:
//! ```toml
//! pdf2img = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cleanup;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
#[cfg(feature = "server")]
pub mod http;
pub mod output;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cleanup::{cleanup, spawn_periodic_sweep, sweep};
pub use config::{ServiceConfig, ServiceConfigBuilder, DPI_RANGE};
pub use convert::convert;
pub use engine::{PdftoppmEngine, Rasterizer};
pub use error::ConvertError;
#[cfg(feature = "server")]
pub use http::{router, AppState};
pub use output::{ErrorBody, HealthReport, ImageFormat, Manifest};
pub use workspace::{JobId, WorkspaceManager};
