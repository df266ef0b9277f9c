//! Response types returned by the conversion service.
//!
//! These structs define the wire contract: the manifest describing a
//! completed conversion, the uniform error body, and the health report.
//! They are plain serde types so the library can be used without the HTTP
//! layer and so tests can assert on exact JSON shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConvertError;

/// Output image format for rasterized pages.
///
/// A closed enumeration on purpose: the engine flags, file extensions, and
/// content types are all derived from it, so an unvalidated string can never
/// reach argument construction or path handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// File extension the engine produces for this format.
    ///
    /// pdftoppm writes `.jpg` (not `.jpeg`) for JPEG output; page filenames
    /// follow the engine.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// MIME type for serving files of this format.
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg => write!(f, "jpeg"),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(ImageFormat::Png),
            "jpeg" => Ok(ImageFormat::Jpeg),
            other => Err(ConvertError::InvalidParameter(format!(
                "format must be 'png' or 'jpeg', got '{other}'"
            ))),
        }
    }
}

/// The structured result of a completed conversion.
///
/// Invariant: `count == files.len()`, `files` is sorted by page number
/// ascending, and the set exactly equals the files present in the job's
/// workspace immediately after the conversion returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub ok: bool,
    /// Opaque job identifier; the namespace key for retrieval and cleanup.
    pub job_id: String,
    pub format: ImageFormat,
    pub dpi: u32,
    /// Number of pages produced. Always ≥ 1 (zero pages is an error).
    pub count: usize,
    /// Page filenames, `page-1.<ext>` … `page-N.<ext>`, in page order.
    pub files: Vec<String>,
    /// Prefix a caller joins with a filename to download it.
    pub download_base: String,
}

/// Uniform error body: `{ok: false, error: "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

/// Health report for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// "healthy" when the engine binary responds to a probe, else "degraded".
    pub status: String,
    pub engine_available: bool,
    pub workspace_root: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_round_trips_through_str() {
        assert_eq!("png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("jpeg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!("webp".parse::<ImageFormat>().is_err());
        // Uppercase is not accepted; the HTTP layer passes the query value
        // through verbatim.
        assert!("PNG".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn jpeg_uses_jpg_extension() {
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(ImageFormat::Jpeg.to_string(), "jpeg");
    }

    #[test]
    fn manifest_serialises_format_lowercase() {
        let m = Manifest {
            ok: true,
            job_id: "j".into(),
            format: ImageFormat::Png,
            dpi: 300,
            count: 1,
            files: vec!["page-1.png".into()],
            download_base: "/download/j/".into(),
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["format"], "png");
        assert_eq!(json["count"], 1);
    }
}
