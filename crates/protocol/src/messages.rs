//! Request and response payloads for the upload endpoints.

use serde::{Deserialize, Serialize};

/// Reply to `POST /upload/largeChunk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResponse {
    /// Bytes received for this chunk.
    pub chunk_size: u64,
    pub index: u32,
    /// Declared size of the whole file.
    pub total_chunks_size: u64,
    /// Sum of the sizes of every chunk persisted so far.
    pub uploaded_bytes: u64,
}

/// Body of `POST /upload/largeCheck`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub file_hash: String,
}

/// Reply to `POST /upload/largeCheck`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub file_hash: String,
    pub uploaded_chunks: Vec<u32>,
}

/// Body of `POST /upload/largeMerge`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub file_hash: String,
    pub file_name: String,
}

/// Query of `GET /upload/largeSecond` and `GET /upload/largeStatus`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondQuery {
    #[serde(default)]
    pub file_hash: String,
}

/// Query of `GET /upload/getResource`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Description of a file in the completed area.
///
/// `mimetype` is always derived from the extension, never from data the
/// client declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_name: String,
    pub mimetype: String,
    /// Extension including the leading dot, or empty.
    #[serde(default)]
    pub extension: String,
    pub path: String,
    pub size: u64,
}

/// Reply to `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub version: String,
}
