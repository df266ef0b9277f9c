//! Rasterization engine invocation.
//!
//! The service never renders PDF content itself — it invokes poppler's
//! `pdftoppm`, which reads the document and writes one image file per page
//! directly into the destination directory. No page content passes through
//! this process's memory.
//!
//! ## Why a trait?
//!
//! [`Rasterizer`] models the engine as a capability the orchestrator depends
//! on, so tests substitute a fake that writes N files without spawning a
//! process. The suite stays fast and deterministic, and CI does not need
//! poppler installed.
//!
//! ## Resource note
//!
//! One invocation spawns exactly one external process; the service places no
//! cap on how many run at once. Under sustained load that is a real
//! resource-exhaustion risk — a semaphore-gated admission limit is the
//! obvious hardening step for production deployments.

use crate::config::ServiceConfig;
use crate::error::ConvertError;
use crate::output::ImageFormat;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// How long the health probe waits for `pdftoppm -v` before declaring the
/// engine unavailable.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// The external page-rasterization capability.
///
/// Contract: after a successful `rasterize`, `dest_dir` contains one
/// `page-*` image file per document page and nothing else was touched
/// outside `dest_dir`. Repeated invocations on the same inputs produce the
/// same number of pages.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render every page of `document` into `dest_dir`.
    async fn rasterize(
        &self,
        document: &Path,
        dest_dir: &Path,
        format: ImageFormat,
        dpi: u32,
    ) -> Result<(), ConvertError>;

    /// Whether the engine is reachable. Drives the health endpoint.
    async fn is_available(&self) -> bool;
}

/// Production engine: spawns `pdftoppm` under a wall-clock timeout.
#[derive(Debug, Clone)]
pub struct PdftoppmEngine {
    binary: PathBuf,
    timeout: Duration,
    jpeg_quality: u8,
}

impl PdftoppmEngine {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration, jpeg_quality: u8) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            jpeg_quality,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.engine_binary.clone(),
            config.engine_timeout(),
            config.jpeg_quality,
        )
    }

    /// Build the engine command line.
    ///
    /// Output prefix `<dest>/page` makes pdftoppm write `page-1.png`,
    /// `page-2.png`, … (zero-padded once the document passes 9 pages; the
    /// orchestrator normalizes that afterwards).
    fn command(&self, document: &Path, dest_dir: &Path, format: ImageFormat, dpi: u32) -> Command {
        let mut cmd = Command::new(&self.binary);
        match format {
            ImageFormat::Png => {
                cmd.arg("-png");
            }
            ImageFormat::Jpeg => {
                cmd.arg("-jpeg")
                    .arg("-jpegopt")
                    .arg(format!("quality={}", self.jpeg_quality));
            }
        }
        cmd.arg("-r")
            .arg(dpi.to_string())
            .arg(document)
            .arg(dest_dir.join("page"));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The child must not outlive a timed-out or cancelled request.
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Rasterizer for PdftoppmEngine {
    async fn rasterize(
        &self,
        document: &Path,
        dest_dir: &Path,
        format: ImageFormat,
        dpi: u32,
    ) -> Result<(), ConvertError> {
        let mut cmd = self.command(document, dest_dir, format, dpi);
        debug!(
            engine = %self.binary.display(),
            document = %document.display(),
            %format,
            dpi,
            "Invoking rasterization engine"
        );

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConvertError::EngineFailure {
                    detail: format!(
                        "{} not found. Install poppler-utils.",
                        self.binary.display()
                    ),
                }
            } else {
                ConvertError::io(&self.binary, e)
            }
        })?;

        // On timeout the output future is dropped, and kill_on_drop reaps
        // the child; the forcible-termination guarantee lives there.
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ConvertError::io(&self.binary, e))?,
            Err(_elapsed) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Engine exceeded wall-clock ceiling, killed"
                );
                return Err(ConvertError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                "engine failed with unknown error".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(ConvertError::EngineFailure { detail });
        }

        debug!("Engine invocation completed");
        Ok(())
    }

    async fn is_available(&self) -> bool {
        let probe = Command::new(&self.binary)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match timeout(PROBE_TIMEOUT, probe).await {
            Ok(Ok(status)) => status.success(),
            _ => false,
        }
    }
}
