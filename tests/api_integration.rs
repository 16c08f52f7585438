use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use video_reels::config::Config;
use video_reels::handlers::build_router;
use video_reels::models::AppState;
use video_reels::store::VideoStore;

const BOUNDARY: &str = "reels-test-boundary";

fn make_app(dir: &Path) -> axum::Router {
    make_app_with_limit(dir, 50 * 1024 * 1024)
}

fn make_app_with_limit(dir: &Path, max_file_size: u64) -> axum::Router {
    let config = Config {
        port: 0,
        upload_dir: dir.to_path_buf(),
        metadata_file: dir.join("metadata.json"),
        max_file_size,
        sample_size: 10,
    };
    let state = Arc::new(AppState {
        store: VideoStore::new(&config),
        config,
    });
    build_router(state)
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"video\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn hello_returns_plain_text() {
    let dir = tempfile::tempdir().unwrap();
    let response = make_app(dir.path()).oneshot(get("/api/hello")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Hello World");
}

#[tokio::test]
async fn empty_directory_returns_404_no_videos_found() {
    let dir = tempfile::tempdir().unwrap();
    let response = make_app(dir.path())
        .oneshot(get("/api/videos"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["message"], "No videos found");
}

#[tokio::test]
async fn unreadable_upload_dir_returns_500() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("file");
    std::fs::write(&not_a_dir, b"x").unwrap();

    let response = make_app(&not_a_dir)
        .oneshot(get("/api/videos"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Unable to read video files");
}

#[tokio::test]
async fn upload_then_list_includes_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let app = make_app(dir.path());

    // Empty feed first.
    let response = app.clone().oneshot(get("/api/videos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Upload a valid clip.
    let body = multipart_body(
        &[("teamName", "Alpha"), ("description", "demo")],
        Some(("demo.mp4", "video/mp4", &[0u8; 4096])),
    );
    let response = app.clone().oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let video_url = json["videoUrl"].as_str().unwrap().to_string();
    assert!(video_url.starts_with("/uploads/"));
    assert!(video_url.ends_with(".mp4"));

    // It shows up in the next listing with its metadata.
    let response = app.clone().oneshot(get("/api/videos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let videos = json["videos"].as_array().unwrap();
    let uploaded = videos
        .iter()
        .find(|v| v["url"] == video_url.as_str())
        .expect("uploaded video missing from listing");
    assert_eq!(uploaded["teamName"], "Alpha");
    assert_eq!(uploaded["description"], "demo");
}

#[tokio::test]
async fn upload_rejects_disallowed_extension() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(
        &[("teamName", "Alpha"), ("description", "demo")],
        Some(("anim.gif", "video/mp4", b"gif bytes")),
    );
    let response = make_app(dir.path())
        .oneshot(upload_request(body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    let error = json["error"].as_str().unwrap();
    assert!(error.contains(".mp4"));
    assert!(error.contains(".mov"));

    // And it never appears in a listing.
    let response = make_app(dir.path())
        .oneshot(get("/api/videos"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_rejects_non_video_content_type() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(
        &[],
        Some(("demo.mp4", "application/octet-stream", b"bytes")),
    );
    let response = make_app(dir.path())
        .oneshot(upload_request(body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Only video files are allowed");
}

#[tokio::test]
async fn upload_rejects_oversized_file() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(
        &[("teamName", "Alpha"), ("description", "demo")],
        Some(("big.mp4", "video/mp4", &[0u8; 4096])),
    );
    let response = make_app_with_limit(dir.path(), 1024)
        .oneshot(upload_request(body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("File too large"));
}

#[tokio::test]
async fn upload_without_file_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(&[("teamName", "Alpha"), ("description", "demo")], None);
    let response = make_app(dir.path())
        .oneshot(upload_request(body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No file uploaded");
}

#[tokio::test]
async fn upload_without_metadata_gets_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let app = make_app(dir.path());

    let body = multipart_body(&[], Some(("demo.mov", "video/quicktime", b"bytes")));
    let response = app.clone().oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/api/videos")).await.unwrap();
    let json = body_json(response).await;
    let video = &json["videos"][0];
    assert_eq!(video["teamName"], "Unknown Team");
    assert_eq!(video["description"], "No description available");
}

#[tokio::test]
async fn uploaded_bytes_are_served_from_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let app = make_app(dir.path());

    let payload = b"fake mp4 payload";
    let body = multipart_body(
        &[("teamName", "Alpha"), ("description", "demo")],
        Some(("demo.mp4", "video/mp4", payload)),
    );
    let response = app.clone().oneshot(upload_request(body)).await.unwrap();
    let json = body_json(response).await;
    let video_url = json["videoUrl"].as_str().unwrap().to_string();

    let response = app.clone().oneshot(get(&video_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), payload);
}

#[tokio::test]
async fn listing_never_exceeds_sample_size() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..15 {
        std::fs::write(dir.path().join(format!("v{i}.mp4")), b"x").unwrap();
    }

    let response = make_app(dir.path())
        .oneshot(get("/api/videos"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["videos"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn missing_multipart_content_type_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .body(Body::from("not multipart"))
        .unwrap();
    let response = make_app(dir.path()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
