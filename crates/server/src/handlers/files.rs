//! Single-shot uploads, completed-file listing and downloads.

use axum::Json;
use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use chunkdrop_protocol::{ApiResponse, FileDescriptor, HealthResponse, ResourceQuery};
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};
use crate::handlers::{describe_completed, mime_for};
use crate::state::AppState;

/// Multipart field carrying single-shot files.
const FILES_FIELD: &str = "files";

/// Stores every `files` part under a unique name.
pub async fn upload_files(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ApiResponse<Vec<FileDescriptor>>>> {
    let mut multipart = multipart.map_err(|e| ApiError::Parse(e.body_text()))?;

    let mut stored = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Parse(e.to_string()))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        let file = state.engine.store_completed(&original, &bytes).await?;
        stored.push(describe_completed(&file));
    }

    if stored.is_empty() {
        return Err(ApiError::BadRequest("no file uploaded".into()));
    }
    Ok(Json(ApiResponse::ok("file uploaded", stored)))
}

/// Lists every completed file.
pub async fn list_resources(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<FileDescriptor>>>> {
    let files = state.engine.list_completed().await?;
    let descriptors = files.iter().map(describe_completed).collect();
    Ok(Json(ApiResponse::ok("resources", descriptors)))
}

/// Describes the completed file whose name without extension is `fileName`.
pub async fn get_resource(
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
) -> ApiResult<Json<ApiResponse<FileDescriptor>>> {
    let stem = query
        .file_name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing fileName parameter".into()))?;
    let file = state
        .engine
        .find_completed(&stem)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("file not found: {stem}")))?;
    Ok(Json(ApiResponse::ok("resource", describe_completed(&file))))
}

/// Streams a completed file as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(stem): Path<String>,
) -> ApiResult<Response> {
    let file = state
        .engine
        .find_completed(&stem)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("file not found: {stem}")))?;

    let handle = tokio::fs::File::open(&file.path)
        .await
        .map_err(chunkdrop_transfer::TransferError::from)?;

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(&mime_for(&file.name))
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.size));
    let disposition = format!("attachment; filename=\"{}\"", file.name.replace('"', ""));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    tracing::info!(file = %file.name, size = file.size, "download");
    Ok((headers, Body::from_stream(ReaderStream::new(handle))).into_response())
}

pub async fn health_check() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(
        "ok",
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    ))
}
