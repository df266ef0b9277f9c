//! Conversion orchestration: the core control flow of the service.
//!
//! One call to [`convert`] performs one job, start to finish:
//!
//! ```text
//! upload ──▶ validate ──▶ workspace ──▶ persist ──▶ rasterize ──▶ normalize ──▶ manifest
//!            (fmt/dpi)    (fresh dir)   (input.pdf)  (engine)      (page-N.ext)
//! ```
//!
//! Every failure after the workspace exists triggers best-effort deletion of
//! the partial workspace before the error propagates — failed jobs never
//! leak disk state. Validation failures happen before any disk or process
//! work, so they leave nothing to clean up.

use crate::config::DPI_RANGE;
use crate::engine::Rasterizer;
use crate::error::ConvertError;
use crate::output::{ImageFormat, Manifest};
use crate::workspace::WorkspaceManager;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info, warn};

/// Fixed, sanitized name for the persisted upload. The caller-declared
/// filename is validated but never used for path construction.
const SOURCE_NAME: &str = "input.pdf";

/// Engine output filenames: `page-<n>.<ext>`, possibly zero-padded
/// (`page-01.png`) for documents past 9 pages.
static PAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page-0*([1-9][0-9]*)\.(png|jpg)$").expect("valid pattern"));

/// Convert an uploaded PDF into one image per page inside a fresh job
/// workspace.
///
/// # Arguments
/// * `workspaces` — allocator/owner of job directories
/// * `engine` — the rasterization capability
/// * `declared_filename` — the caller's filename; checked for a `.pdf`
///   suffix, never trusted for paths
/// * `upload` — raw uploaded bytes
/// * `fmt` — requested format string, must be `png` or `jpeg`
/// * `dpi` — requested resolution, must lie in [`DPI_RANGE`]
///
/// # Errors
/// `InvalidParameter` / `InvalidDocument` before any disk work;
/// `EngineFailure`, `Timeout`, `NoPagesProduced`, or `Io` afterwards, always
/// with the partial workspace already removed.
pub async fn convert(
    workspaces: &WorkspaceManager,
    engine: &dyn Rasterizer,
    declared_filename: &str,
    upload: &[u8],
    fmt: &str,
    dpi: u32,
) -> Result<Manifest, ConvertError> {
    // ── Step 1: Validate parameters (no disk or process work yet) ────────
    let format: ImageFormat = fmt.parse()?;
    if !DPI_RANGE.contains(&dpi) {
        return Err(ConvertError::InvalidParameter(format!(
            "dpi must be {}-{}, got {}",
            DPI_RANGE.start(),
            DPI_RANGE.end(),
            dpi
        )));
    }
    if declared_filename.is_empty() {
        return Err(ConvertError::InvalidParameter(
            "No filename provided".into(),
        ));
    }
    if !declared_filename.to_lowercase().ends_with(".pdf") {
        return Err(ConvertError::InvalidParameter(
            "File must be a PDF".into(),
        ));
    }
    check_pdf_magic(upload)?;

    // ── Step 2: Allocate the job workspace ───────────────────────────────
    let (job_id, dir) = workspaces.create().await?;
    info!(%job_id, %format, dpi, size = upload.len(), "Starting conversion");

    // ── Steps 3–5 run against the workspace; any failure cleans it up ────
    match run_job(engine, &dir, upload, format, dpi).await {
        Ok(files) => {
            info!(%job_id, pages = files.len(), "Conversion complete");
            Ok(Manifest {
                ok: true,
                count: files.len(),
                files,
                job_id: job_id.to_string(),
                format,
                dpi,
                download_base: format!("/download/{job_id}/"),
            })
        }
        Err(e) => {
            if let Err(cleanup_err) = workspaces.delete(&job_id).await {
                warn!(%job_id, error = %cleanup_err, "Cleanup of failed job did not complete");
            }
            Err(e)
        }
    }
}

/// The failable middle of the pipeline: persist, rasterize, normalize.
async fn run_job(
    engine: &dyn Rasterizer,
    dir: &Path,
    upload: &[u8],
    format: ImageFormat,
    dpi: u32,
) -> Result<Vec<String>, ConvertError> {
    // ── Step 3: Persist the upload under a fixed name ────────────────────
    let source = dir.join(SOURCE_NAME);
    tokio::fs::write(&source, upload)
        .await
        .map_err(|e| ConvertError::io(&source, e))?;

    // ── Step 4: Invoke the engine into the same workspace ────────────────
    engine.rasterize(&source, dir, format, dpi).await?;

    // ── Step 5: Drop the source, normalize and order outputs ─────────────
    // Removing the source first keeps the invariant that the manifest file
    // set exactly equals the workspace contents on return.
    tokio::fs::remove_file(&source)
        .await
        .map_err(|e| ConvertError::io(&source, e))?;

    let files = normalize_pages(dir, format).await?;
    if files.is_empty() {
        return Err(ConvertError::NoPagesProduced);
    }
    Ok(files)
}

/// Rename engine outputs to the stable `page-<n>.<ext>` scheme and return
/// them sorted by page number ascending.
///
/// pdftoppm zero-pads page numbers to the width of the page count
/// (`page-01.png` … `page-12.png`); stripping the padding gives callers one
/// naming scheme regardless of document length.
async fn normalize_pages(dir: &Path, format: ImageFormat) -> Result<Vec<String>, ConvertError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConvertError::io(dir, e))?;

    let mut pages: Vec<(usize, String)> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::io(dir, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(caps) = PAGE_FILE.captures(&name) else {
            debug!(file = %name, "Ignoring non-page file in workspace");
            continue;
        };
        let number: usize = caps[1].parse().map_err(|_| ConvertError::EngineFailure {
            detail: format!("unparseable page number in engine output '{name}'"),
        })?;

        let canonical = format!("page-{number}.{}", format.extension());
        if name != canonical {
            let from = dir.join(&name);
            let to = dir.join(&canonical);
            tokio::fs::rename(&from, &to)
                .await
                .map_err(|e| ConvertError::io(&from, e))?;
        }
        pages.push((number, canonical));
    }

    pages.sort_unstable_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, name)| name).collect())
}

/// Verify the `%PDF` magic so garbage uploads fail fast with a clear error
/// instead of an opaque engine diagnostic.
fn check_pdf_magic(upload: &[u8]) -> Result<(), ConvertError> {
    let mut magic = [0u8; 4];
    let len = upload.len().min(4);
    magic[..len].copy_from_slice(&upload[..len]);
    if &magic != b"%PDF" {
        return Err(ConvertError::InvalidDocument { magic });
    }
    Ok(())
}
