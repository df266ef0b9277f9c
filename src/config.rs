//! Configuration types for the conversion service.
//!
//! All runtime behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share the config across request handlers, serialise it for
//! logging, and diff two deployments to understand why they behave
//! differently.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Inclusive DPI range accepted by the conversion endpoint.
///
/// 72 is the historical screen floor; above 600 the page images grow past
/// what OCR engines gain anything from while multiplying disk and engine
/// time. Requests outside the range are rejected, never clamped.
pub const DPI_RANGE: std::ops::RangeInclusive<u32> = 72..=600;

/// Configuration for the pdf2img service.
///
/// Built via [`ServiceConfig::builder()`] or [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2img::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .workspace_root("/var/lib/pdf2img")
///     .engine_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root directory holding one subdirectory per job. Default:
    /// `${TMPDIR}/pdf2img`.
    ///
    /// Everything the service persists lives under this directory; it is
    /// created on startup if missing. Point it at a volume you are happy to
    /// lose — job state does not survive a restart by design.
    pub workspace_root: PathBuf,

    /// Rasterization engine binary. Default: `pdftoppm` (poppler-utils).
    ///
    /// Resolved through `PATH` unless an absolute path is given. The service
    /// never reimplements rendering; it only invokes this binary, so swapping
    /// in a wrapper script is a supported deployment technique.
    pub engine_binary: PathBuf,

    /// Wall-clock ceiling for one engine invocation, in seconds. Default: 300.
    ///
    /// The only hard bound on an abandoned rasterization. On expiry the
    /// child process is killed and the request fails with `Timeout`.
    pub engine_timeout_secs: u64,

    /// JPEG quality passed to the engine for `fmt=jpeg`. Default: 95.
    ///
    /// High quality on purpose: these images feed OCR, where compression
    /// artefacts on glyph edges cost accuracy. PNG output ignores this.
    pub jpeg_quality: u8,

    /// Age beyond which an idle job's workspace is purged, in seconds.
    /// Default: 3600.
    ///
    /// Must comfortably exceed `engine_timeout_secs` so the sweep can never
    /// observe a workspace that is still mid-write.
    pub retention_secs: u64,

    /// Interval between background purge sweeps, in seconds. Default: 300.
    pub sweep_interval_secs: u64,

    /// Maximum accepted upload size in bytes. Default: 50 MiB.
    ///
    /// Enforced by the multipart layer before any disk work.
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("pdf2img"),
            engine_binary: PathBuf::from("pdftoppm"),
            engine_timeout_secs: 300,
            jpeg_quality: 95,
            retention_secs: 3600,
            sweep_interval_secs: 300,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Engine timeout as a [`Duration`].
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    /// Retention threshold as a [`Duration`].
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = root.into();
        self
    }

    pub fn engine_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.config.engine_binary = binary.into();
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn retention_secs(mut self, secs: u64) -> Self {
        self.config.retention_secs = secs;
        self
    }

    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.config.sweep_interval_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConvertError> {
        let c = &self.config;
        if c.engine_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Engine timeout must be ≥ 1 second".into(),
            ));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(ConvertError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.sweep_interval_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Sweep interval must be ≥ 1 second".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "Maximum upload size must be non-zero".into(),
            ));
        }
        Ok(self.config)
    }
}
