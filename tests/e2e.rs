//! End-to-end tests for the pdf2img service.
//!
//! These drive the full axum router with `tower::ServiceExt::oneshot` and a
//! fake rasterization engine, so the whole HTTP surface is exercised without
//! poppler installed and without spawning a single process. The fake writes
//! real PNG bytes pdftoppm-style (zero-padded names included) so the
//! normalization and byte-identity guarantees are tested for real.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pdf2img::{AppState, ConvertError, ImageFormat, Rasterizer, ServiceConfig};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

const BOUNDARY: &str = "e2e-test-boundary";
const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\nendobj\ntrailer\n%%EOF\n";

/// Deterministic PNG content for page `n`: a 2x2 image whose red channel is
/// the page number.
fn page_png(n: usize) -> Vec<u8> {
    use image::{Rgba, RgbaImage};
    let img = RgbaImage::from_pixel(2, 2, Rgba([n as u8, 0, 0, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageFormat::Png,
        )
        .expect("encode fixture png");
    buf
}

/// Fake engine: writes `pages` files the way pdftoppm names them, without
/// spawning anything. `available` drives the health probe.
struct FakeEngine {
    pages: usize,
    available: bool,
}

#[async_trait]
impl Rasterizer for FakeEngine {
    async fn rasterize(
        &self,
        _document: &Path,
        dest_dir: &Path,
        format: ImageFormat,
        _dpi: u32,
    ) -> Result<(), ConvertError> {
        let width = self.pages.to_string().len();
        for n in 1..=self.pages {
            let name = format!("page-{n:0width$}.{}", format.extension());
            let content = match format {
                ImageFormat::Png => page_png(n),
                ImageFormat::Jpeg => format!("jpeg-bytes-{n}").into_bytes(),
            };
            std::fs::write(dest_dir.join(name), content)
                .map_err(|e| ConvertError::io(dest_dir, e))?;
        }
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}

fn service(pages: usize) -> (TempDir, Router) {
    service_with(FakeEngine {
        pages,
        available: true,
    })
}

fn service_with(engine: FakeEngine) -> (TempDir, Router) {
    let tmp = TempDir::new().expect("tempdir");
    let config = ServiceConfig::builder()
        .workspace_root(tmp.path().join("jobs"))
        .build()
        .expect("valid config");
    let state = AppState::with_engine(config, Arc::new(engine)).expect("state");
    (tmp, pdf2img::router(Arc::new(state)))
}

/// Build a multipart/form-data body with one `pdf` field.
fn multipart_upload(filename: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"pdf\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

async fn post_pdf(app: &Router, uri: &str, filename: &str, bytes: &[u8]) -> (StatusCode, serde_json::Value) {
    let (content_type, body) = multipart_upload(filename, bytes);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

async fn get_raw(app: &Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, bytes.to_vec())
}

async fn delete_raw(app: &Router, uri: &str) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

fn job_count(tmp: &TempDir) -> usize {
    std::fs::read_dir(tmp.path().join("jobs")).unwrap().count()
}

// ── Conversion scenarios ─────────────────────────────────────────────────────

#[tokio::test]
async fn three_page_upload_download_cleanup_roundtrip() {
    let (tmp, app) = service(3);

    // Upload.
    let (status, body) = post_pdf(&app, "/pdf-to-images?fmt=png&dpi=300", "doc.pdf", PDF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["count"], 3);
    assert_eq!(body["format"], "png");
    assert_eq!(body["dpi"], 300);
    assert_eq!(
        body["files"],
        serde_json::json!(["page-1.png", "page-2.png", "page-3.png"])
    );
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert_eq!(
        body["download_base"].as_str().unwrap(),
        format!("/download/{job_id}/")
    );
    assert_eq!(job_count(&tmp), 1);

    // Download page 2: correct content type, valid PNG, byte-identical to
    // what the engine wrote, and idempotent.
    let uri = format!("/download/{job_id}/page-2.png");
    let (status, content_type, first) = get_raw(&app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(first, page_png(2));
    image::load_from_memory(&first).expect("served bytes must be a valid PNG");

    let (_, _, second) = get_raw(&app, &uri).await;
    assert_eq!(first, second, "repeated fetch must be byte-identical");

    // Cleanup, then every retrieval 404s.
    assert_eq!(delete_raw(&app, &format!("/cleanup/{job_id}")).await, StatusCode::OK);
    let (status, _, _) = get_raw(&app, &format!("/download/{job_id}/page-1.png")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        delete_raw(&app, &format!("/cleanup/{job_id}")).await,
        StatusCode::NOT_FOUND
    );
    assert_eq!(job_count(&tmp), 0);
}

#[tokio::test]
async fn jpeg_conversion_serves_jpg_files() {
    let (_tmp, app) = service(2);

    let (status, body) = post_pdf(&app, "/pdf-to-images?fmt=jpeg&dpi=150", "scan.pdf", PDF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"], serde_json::json!(["page-1.jpg", "page-2.jpg"]));

    let job_id = body["job_id"].as_str().unwrap();
    let (status, content_type, bytes) =
        get_raw(&app, &format!("/download/{job_id}/page-1.jpg")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(bytes, b"jpeg-bytes-1");
}

#[tokio::test]
async fn twelve_pages_are_normalized_and_ordered() {
    let (_tmp, app) = service(12);

    let (status, body) = post_pdf(&app, "/pdf-to-images", "doc.pdf", PDF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 12);
    let files: Vec<String> = serde_json::from_value(body["files"].clone()).unwrap();
    assert_eq!(files[0], "page-1.png");
    assert_eq!(files[9], "page-10.png");
    assert_eq!(files[11], "page-12.png");
}

#[tokio::test]
async fn defaults_are_png_at_300_dpi() {
    let (_tmp, app) = service(1);
    let (status, body) = post_pdf(&app, "/pdf-to-images", "doc.pdf", PDF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["format"], "png");
    assert_eq!(body["dpi"], 300);
}

// ── Rejection scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn corrupted_upload_leaves_no_workspace() {
    let (tmp, app) = service(3);

    let (status, body) = post_pdf(
        &app,
        "/pdf-to-images",
        "doc.pdf",
        b"this is not a pdf at all",
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("not a valid PDF"));
    assert_eq!(job_count(&tmp), 0, "no workspace may be left on disk");
}

#[tokio::test]
async fn out_of_range_parameters_rejected_before_any_work() {
    let (tmp, app) = service(3);

    for uri in [
        "/pdf-to-images?dpi=71",
        "/pdf-to-images?dpi=601",
        "/pdf-to-images?fmt=webp",
    ] {
        let (status, body) = post_pdf(&app, uri, "doc.pdf", PDF).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["ok"], false);
    }

    let (status, _) = post_pdf(&app, "/pdf-to-images", "doc.txt", PDF).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(job_count(&tmp), 0, "rejected requests must create nothing");
}

#[tokio::test]
async fn missing_pdf_field_is_a_bad_request() {
    let (_tmp, app) = service(1);

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"other\"\r\n\r\nhello\r\n");
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/pdf-to-images")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ── Retrieval hardening ──────────────────────────────────────────────────────

#[tokio::test]
async fn traversal_is_indistinguishable_from_not_found() {
    let (tmp, app) = service(1);
    let (_, body) = post_pdf(&app, "/pdf-to-images", "doc.pdf", PDF).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    // A real file traversal would love to reach.
    std::fs::write(tmp.path().join("jobs").join("secret.txt"), b"secret").unwrap();

    for filename in ["..", "..%2Fsecret.txt", "..%5Csecret.txt", "%2Fetc%2Fpasswd"] {
        let (status, _, bytes) =
            get_raw(&app, &format!("/download/{job_id}/{filename}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "filename {filename}");
        assert!(
            !bytes.windows(6).any(|w| w == b"secret"),
            "response must not leak file content"
        );
    }

    // Plain missing file gets the same answer.
    let (status, _, _) = get_raw(&app, &format!("/download/{job_id}/page-9.png")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_and_malformed_job_ids() {
    let (_tmp, app) = service(1);

    let (status, _, _) = get_raw(
        &app,
        "/download/00000000-0000-4000-8000-000000000000/page-1.png",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get_raw(&app, "/download/not-a-uuid/page-1.png").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(
        delete_raw(&app, "/cleanup/not-a-uuid").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn concurrent_jobs_stay_isolated() {
    let (tmp, app) = service(2);

    let (a, b) = tokio::join!(
        post_pdf(&app, "/pdf-to-images", "a.pdf", PDF),
        post_pdf(&app, "/pdf-to-images", "b.pdf", PDF),
    );
    let (job_a, job_b) = (
        a.1["job_id"].as_str().unwrap().to_string(),
        b.1["job_id"].as_str().unwrap().to_string(),
    );
    assert_ne!(job_a, job_b);
    assert_eq!(job_count(&tmp), 2);

    // Deleting one job leaves the other fully retrievable.
    assert_eq!(delete_raw(&app, &format!("/cleanup/{job_a}")).await, StatusCode::OK);
    let (status, _, _) = get_raw(&app, &format!("/download/{job_b}/page-1.png")).await;
    assert_eq!(status, StatusCode::OK);
}

// ── Health ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reflects_engine_availability() {
    let (_tmp, app) = service_with(FakeEngine {
        pages: 1,
        available: true,
    });
    let (status, _, bytes) = get_raw(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["engine_available"], true);
    assert!(body["workspace_root"].as_str().unwrap().contains("jobs"));

    let (_tmp, app) = service_with(FakeEngine {
        pages: 1,
        available: false,
    });
    let (_, _, bytes) = get_raw(&app, "/health").await;
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["engine_available"], false);
}
