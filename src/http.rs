//! HTTP surface: axum router and handlers.
//!
//! A thin shim over the library — every handler validates route/query input,
//! delegates to the conversion, workspace, or cleanup modules, and maps
//! [`ConvertError`] onto a status code plus the uniform
//! `{ok: false, error: "..."}` body. No conversion logic lives here.
//!
//! The download handler streams file bytes with [`ReaderStream`]; images are
//! served byte-identical to what the engine produced, without buffering a
//! whole file in memory.

use crate::cleanup;
use crate::config::ServiceConfig;
use crate::convert::convert;
use crate::engine::{PdftoppmEngine, Rasterizer};
use crate::error::ConvertError;
use crate::output::{ErrorBody, HealthReport};
use crate::workspace::{JobId, WorkspaceManager};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::warn;

/// Shared state handed to every handler.
pub struct AppState {
    pub config: ServiceConfig,
    pub workspaces: WorkspaceManager,
    pub engine: Arc<dyn Rasterizer>,
}

impl AppState {
    /// Production state: workspace manager rooted at the configured
    /// directory, pdftoppm as the engine.
    pub fn new(config: ServiceConfig) -> Result<Self, ConvertError> {
        let engine = Arc::new(PdftoppmEngine::from_config(&config));
        Self::with_engine(config, engine)
    }

    /// State with a caller-supplied engine. The seam the test suite uses to
    /// run the full router without spawning processes.
    pub fn with_engine(
        config: ServiceConfig,
        engine: Arc<dyn Rasterizer>,
    ) -> Result<Self, ConvertError> {
        let workspaces = WorkspaceManager::new(&config.workspace_root)?;
        Ok(Self {
            config,
            workspaces,
            engine,
        })
    }
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/pdf-to-images", post(pdf_to_images))
        .route("/download/{job_id}/{filename}", get(download_image))
        .route("/cleanup/{job_id}", delete(cleanup_job))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ── Error mapping ────────────────────────────────────────────────────────

/// One place decides which taxonomy variant maps to which status code.
fn status_for(err: &ConvertError) -> StatusCode {
    match err {
        ConvertError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        ConvertError::InvalidDocument { .. }
        | ConvertError::EngineFailure { .. }
        | ConvertError::NoPagesProduced => StatusCode::UNPROCESSABLE_ENTITY,
        ConvertError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ConvertError::NotFound => StatusCode::NOT_FOUND,
        ConvertError::Io { .. } | ConvertError::InvalidConfig(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: ConvertError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, "Request failed");
    }
    (status, Json(ErrorBody::new(err.to_string()))).into_response()
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConvertQuery {
    fmt: Option<String>,
    dpi: Option<u32>,
}

/// `POST /pdf-to-images?fmt={png|jpeg}&dpi={72..600}` with a multipart
/// `pdf` field.
async fn pdf_to_images(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConvertQuery>,
    mut multipart: Multipart,
) -> Response {
    let fmt = query.fmt.unwrap_or_else(|| "png".to_string());
    let dpi = query.dpi.unwrap_or(300);

    // Pull the PDF field out of the multipart body.
    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(ConvertError::InvalidParameter(format!(
                    "Malformed multipart body: {e}"
                )))
            }
        };
        if field.name() != Some("pdf") {
            continue;
        }
        let declared = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((declared, bytes.to_vec())),
            Err(e) => {
                return error_response(ConvertError::InvalidParameter(format!(
                    "Failed to read upload: {e}"
                )))
            }
        }
        break;
    }

    let Some((declared, bytes)) = upload else {
        return error_response(ConvertError::InvalidParameter(
            "No PDF file provided".into(),
        ));
    };

    match convert(
        &state.workspaces,
        state.engine.as_ref(),
        &declared,
        &bytes,
        &fmt,
        dpi,
    )
    .await
    {
        Ok(manifest) => (StatusCode::OK, Json(manifest)).into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /download/{job_id}/{filename}` — stream one page image back.
async fn download_image(
    State(state): State<Arc<AppState>>,
    Path((job_id, filename)): Path<(String, String)>,
) -> Response {
    let job_id: JobId = match job_id.parse() {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    let path = match state.workspaces.resolve(&job_id, &filename).await {
        Ok(path) => path,
        Err(e) => return error_response(e),
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        // Resolved a moment ago; a race with cleanup reads as not-found.
        Err(_) => return error_response(ConvertError::NotFound),
    };

    let body = Body::from_stream(ReaderStream::new(file));
    (
        [
            (header::CONTENT_TYPE, content_type_for(&filename)),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// `DELETE /cleanup/{job_id}` — remove a job's workspace.
async fn cleanup_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    let job_id: JobId = match job_id.parse() {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match cleanup::cleanup(&state.workspaces, &job_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "ok": true,
                "message": format!("Job {job_id} cleaned up"),
            })),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new("Job not found")),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /health` — reports whether the engine binary is reachable.
async fn health(State(state): State<Arc<AppState>>) -> Response {
    let engine_available = state.engine.is_available().await;
    let report = HealthReport {
        status: if engine_available {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        engine_available,
        workspace_root: state.config.workspace_root.display().to_string(),
    };
    (StatusCode::OK, Json(report)).into_response()
}

/// Media type from the requested filename's extension (original mapping).
fn content_type_for(filename: &str) -> String {
    let ext = filename.rsplit('.').next().unwrap_or_default().to_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_match_extensions() {
        assert_eq!(content_type_for("page-1.png"), "image/png");
        assert_eq!(content_type_for("page-2.jpg"), "image/jpeg");
        assert_eq!(content_type_for("PAGE-3.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("weird.bin"), "application/octet-stream");
    }

    #[test]
    fn status_mapping_covers_taxonomy() {
        assert_eq!(
            status_for(&ConvertError::InvalidParameter("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ConvertError::Timeout { secs: 300 }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(status_for(&ConvertError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&ConvertError::NoPagesProduced),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
