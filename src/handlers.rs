use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_TYPE,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use multer::Multipart;
use std::{sync::Arc, time::SystemTime};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::{AppState, UploadResponse, VideosResponse};

pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_dir = state.config.upload_dir.clone();
    Router::new()
        .route("/api/videos", get(videos_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/hello", get(hello_handler))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn hello_handler() -> &'static str {
    "Hello World"
}

/// Random batch of videos with their metadata
pub async fn videos_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VideosResponse>, ApiError> {
    let videos = state.store.list_videos().await?;
    if videos.is_empty() {
        return Err(ApiError::NotFound("No videos found".to_string()));
    }
    info!("[GET /api/videos] Returning {} videos", videos.len());
    Ok(Json(VideosResponse { videos }))
}

/// Upload video file with team name and description
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Result<Json<UploadResponse>, ApiError> {
    let start_time = SystemTime::now();

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Validation("Missing Content-Type header".to_string()))?;

    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| ApiError::Validation(format!("Invalid multipart request: {e}")))?;

    let body_bytes = request
        .into_body()
        .collect()
        .await
        .map_err(|e| ApiError::Validation(format!("Failed to read request: {e}")))?
        .to_bytes();

    let body_stream =
        futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body_bytes) });
    let mut multipart = Multipart::new(body_stream, boundary);

    let mut team_name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut file_data: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Error parsing multipart request: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "video" => {
                if let Some(content_type) = field.content_type() {
                    if !content_type.to_string().starts_with("video/") {
                        return Err(ApiError::Validation(
                            "Only video files are allowed".to_string(),
                        ));
                    }
                }

                let file_name = field.file_name().unwrap_or("video.mp4").to_string();

                // Check the size as we read so an oversize upload is
                // refused without buffering all of it.
                let mut data = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(|e| {
                    ApiError::Validation(format!("Failed to read file: {e}"))
                })? {
                    data.extend_from_slice(&chunk);

                    if data.len() as u64 > state.config.max_file_size {
                        let file_size_mb = data.len() as f64 / 1024.0 / 1024.0;
                        warn!(
                            "[POST /api/upload] Rejected oversize file: {:.2}MB (max: {}MB)",
                            file_size_mb,
                            state.config.max_file_size / 1024 / 1024
                        );
                        return Err(ApiError::Validation(format!(
                            "File too large: {:.2}MB. Maximum file size is {}MB.",
                            file_size_mb,
                            state.config.max_file_size / 1024 / 1024
                        )));
                    }
                }

                file_data = Some((file_name, data));
            }
            "teamName" => {
                team_name = Some(field.text().await.map_err(|e| {
                    ApiError::Validation(format!("Failed to read teamName: {e}"))
                })?);
            }
            "description" => {
                description = Some(field.text().await.map_err(|e| {
                    ApiError::Validation(format!("Failed to read description: {e}"))
                })?);
            }
            _ => {
                // Drain unknown fields
                while field
                    .chunk()
                    .await
                    .map_err(|e| {
                        ApiError::Validation(format!("Failed to process request: {e}"))
                    })?
                    .is_some()
                {}
            }
        }
    }

    let (original_name, file_bytes) =
        file_data.ok_or_else(|| ApiError::Validation("No file uploaded".to_string()))?;

    let file_size_mb = file_bytes.len() as f64 / 1024.0 / 1024.0;
    info!("[POST /api/upload] 📁 File: {}", original_name);
    info!(
        "[POST /api/upload] 📦 Size: {:.2} MB ({} bytes)",
        file_size_mb,
        file_bytes.len()
    );

    let descriptor = state
        .store
        .upload(
            &original_name,
            &file_bytes,
            team_name.unwrap_or_else(crate::models::default_team_name),
            description.unwrap_or_else(crate::models::default_description),
        )
        .await?;

    let upload_time = start_time
        .elapsed()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    info!(
        "[POST /api/upload] ✅ SUCCESS - {} in {:.2}s",
        descriptor.filename, upload_time
    );

    Ok(Json(UploadResponse {
        video_url: descriptor.url,
    }))
}
