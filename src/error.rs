//! Error types for the pdf2img service.
//!
//! A single taxonomy covers the whole conversion pipeline. Every failure
//! inside the orchestrator is caught at the orchestration boundary, triggers
//! cleanup of any partial workspace, and surfaces as exactly one of these
//! variants — a caller never sees a successful-looking manifest next to an
//! error.
//!
//! Nothing is retried by the service itself. `Timeout` is the one variant a
//! caller may reasonably retry; `EngineFailure` on the same document will
//! fail the same way again.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf2img library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Request errors ────────────────────────────────────────────────────
    /// Bad format, DPI, or declared filename. Rejected before any disk or
    /// process work occurs.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The uploaded bytes are not a PDF (missing `%PDF` magic).
    #[error("File is not a valid PDF (first bytes: {magic:?})")]
    InvalidDocument { magic: [u8; 4] },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The rasterization engine exited non-zero. Carries the engine's own
    /// diagnostic text (e.g. "May not be a PDF file", password errors)
    /// without interpretation.
    #[error("Rasterization failed: {detail}")]
    EngineFailure { detail: String },

    /// The engine exceeded the wall-clock ceiling and was killed.
    #[error("PDF conversion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The engine exited cleanly but wrote no page files — almost always a
    /// malformed or empty document, so treated as a failure.
    #[error("No images generated from PDF")]
    NoPagesProduced,

    // ── Retrieval errors ──────────────────────────────────────────────────
    /// Unknown job, unknown file, or a filename rejected by the traversal
    /// check. Deliberately one variant: traversal attempts must not be
    /// distinguishable from ordinary not-found by the caller.
    #[error("File not found")]
    NotFound,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Disk full, permission error, or any other filesystem failure.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConvertError {
    /// Shorthand for wrapping an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the request itself rather than the service
    /// or the document's content. The HTTP layer maps these to 400.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ConvertError::InvalidParameter(_))
    }
}
