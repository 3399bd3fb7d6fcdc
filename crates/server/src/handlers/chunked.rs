//! Chunked upload endpoints.

use axum::Json;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Query, State};
use chunkdrop_protocol::{
    ApiResponse, CheckRequest, CheckResponse, ChunkUploadResponse, FileDescriptor, MergeRequest,
    MetadataRecord, SecondQuery,
};
use chunkdrop_transfer::ChunkUpload;

use crate::error::{ApiError, ApiResult};
use crate::handlers::describe_file;
use crate::state::AppState;

/// Fields of one `largeChunk` multipart request.
#[derive(Debug, Default)]
struct ChunkForm {
    file_hash: Option<String>,
    file_name: Option<String>,
    file_type: Option<String>,
    total_size: Option<u64>,
    total_chunks: Option<u32>,
    index: Option<u32>,
    data: Option<Vec<u8>>,
}

impl ChunkForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "chunk" => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Parse(e.to_string()))?;
                    form.data = Some(bytes.to_vec());
                }
                "fileHash" => form.file_hash = Some(text(field).await?),
                "fileName" => form.file_name = Some(text(field).await?),
                "fileType" => form.file_type = Some(text(field).await?),
                "totalChunksSize" => form.total_size = Some(number(field, "totalChunksSize").await?),
                "totalChunksNum" => form.total_chunks = Some(number(field, "totalChunksNum").await?),
                "chunkIndex" => form.index = Some(number(field, "chunkIndex").await?),
                _ => tracing::trace!(field = %name, "ignoring multipart field"),
            }
        }
        Ok(form)
    }

    fn into_upload(self) -> ApiResult<(ChunkUpload, Vec<u8>)> {
        let upload = ChunkUpload {
            upload_id: self.file_hash.ok_or(ApiError::MissingField("fileHash"))?,
            file_name: self.file_name.ok_or(ApiError::MissingField("fileName"))?,
            file_type: self.file_type.unwrap_or_default(),
            total_size: self.total_size.ok_or(ApiError::MissingField("totalChunksSize"))?,
            total_chunks: self.total_chunks.ok_or(ApiError::MissingField("totalChunksNum"))?,
            index: self.index.ok_or(ApiError::MissingField("chunkIndex"))?,
        };
        let data = self.data.ok_or(ApiError::MissingField("chunk"))?;
        Ok((upload, data))
    }
}

/// Reads a text field. Clients that JSON-encode every form value send
/// strings with surrounding quotes; those are unwrapped.
async fn text(field: Field<'_>) -> ApiResult<String> {
    let raw = field.text().await.map_err(|e| ApiError::Parse(e.to_string()))?;
    Ok(serde_json::from_str::<String>(&raw).unwrap_or(raw))
}

async fn number<T: std::str::FromStr>(field: Field<'_>, name: &str) -> ApiResult<T> {
    let raw = text(field).await?;
    raw.trim()
        .parse()
        .map_err(|_| ApiError::Parse(format!("{name} is not a valid number: {raw}")))
}

/// Stores one chunk.
pub async fn upload_chunk(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ApiResponse<ChunkUploadResponse>>> {
    let multipart = multipart.map_err(|e| ApiError::Parse(e.body_text()))?;
    let (upload, data) = ChunkForm::read(multipart).await?.into_upload()?;

    let receipt = state.engine.receive_chunk(&upload, &data).await?;

    tracing::info!(
        upload_id = %upload.upload_id,
        index = receipt.index,
        size = receipt.chunk_size,
        uploaded = receipt.record.chunks_info.uploaded_chunks.len(),
        total = receipt.record.chunks_info.total_chunks_num,
        "chunk received"
    );

    Ok(Json(ApiResponse::ok(
        "chunk uploaded",
        ChunkUploadResponse {
            chunk_size: receipt.chunk_size,
            index: receipt.index,
            total_chunks_size: receipt.total_size,
            uploaded_bytes: receipt.uploaded_bytes,
        },
    )))
}

/// Reports which chunks are already on the server.
pub async fn check_chunks(
    State(state): State<AppState>,
    body: Result<Json<CheckRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<CheckResponse>>> {
    let Json(req) = body.map_err(|e| ApiError::Parse(e.body_text()))?;
    let uploaded_chunks = state.engine.uploaded_chunks(&req.file_hash).await?;

    tracing::debug!(upload_id = %req.file_hash, uploaded = uploaded_chunks.len(), "progress check");
    Ok(Json(ApiResponse::ok(
        "uploaded chunks",
        CheckResponse {
            file_hash: req.file_hash,
            uploaded_chunks,
        },
    )))
}

/// Concatenates the chunks into the completed area.
pub async fn merge_chunks(
    State(state): State<AppState>,
    body: Result<Json<MergeRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<FileDescriptor>>> {
    let Json(req) = body.map_err(|e| ApiError::Parse(e.body_text()))?;
    let outcome = state.engine.merge(&req.file_hash, &req.file_name).await?;

    Ok(Json(ApiResponse::ok(
        "merge complete",
        describe_file(&req.file_name, &outcome.path, outcome.size),
    )))
}

/// Instant-upload check: `data` is `1` when matching content already exists.
pub async fn instant_check(
    State(state): State<AppState>,
    Query(query): Query<SecondQuery>,
) -> ApiResult<Json<ApiResponse<u8>>> {
    let found = state.engine.has_content(&query.file_hash).await?;
    let msg = if found { "file exists" } else { "file not found" };
    Ok(Json(ApiResponse::ok(msg, u8::from(found))))
}

/// Ledger record of an in-progress upload.
pub async fn session_status(
    State(state): State<AppState>,
    Query(query): Query<SecondQuery>,
) -> ApiResult<Json<ApiResponse<MetadataRecord>>> {
    let record = state
        .engine
        .session(&query.file_hash)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no upload in progress for {}", query.file_hash)))?;
    Ok(Json(ApiResponse::ok("upload status", record)))
}
