use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::METADATA_VERSION;

/// Client-declared attributes of the file being assembled.
///
/// None of these values are checked against the bytes actually received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_name: String,
    pub file_hash: String,
    pub file_size: u64,
    #[serde(default)]
    pub file_type: String,
    pub start_time: DateTime<Utc>,
}

/// Chunk bookkeeping for one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunksInfo {
    pub total_chunks_num: u32,
    /// Recomputed from the chunk directory on every refresh.
    #[serde(default)]
    pub uploaded_chunks: Vec<u32>,
    /// Human-readable description of the declared per-chunk size.
    #[serde(default)]
    pub chunk_size: String,
    pub last_updated: DateTime<Utc>,
}

impl ChunksInfo {
    /// Builds the initial chunk info from the declared totals.
    pub fn declared(total_size: u64, total_chunks_num: u32, now: DateTime<Utc>) -> Self {
        Self {
            total_chunks_num,
            uploaded_chunks: Vec::new(),
            chunk_size: describe_chunk_size(total_size, total_chunks_num),
            last_updated: now,
        }
    }
}

/// Where the session lives on disk and which schema wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub storage_path: String,
    pub version: String,
}

impl SystemInfo {
    pub fn new(storage_path: impl Into<String>) -> Self {
        Self {
            storage_path: storage_path.into(),
            version: METADATA_VERSION.to_string(),
        }
    }
}

/// The per-upload `metadata.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub file_info: FileInfo,
    pub chunks_info: ChunksInfo,
    pub system_info: SystemInfo,
}

impl MetadataRecord {
    /// Indices in `[0, totalChunksNum)` not present in `uploadedChunks`,
    /// at most `limit` of them.
    pub fn missing_chunks(&self, limit: usize) -> Vec<u32> {
        missing_indices(
            &self.chunks_info.uploaded_chunks,
            self.chunks_info.total_chunks_num,
            limit,
        )
    }

    /// Returns `true` once every declared index has been recorded.
    pub fn is_complete(&self) -> bool {
        missing_count(
            &self.chunks_info.uploaded_chunks,
            self.chunks_info.total_chunks_num,
        ) == 0
    }
}

/// Returns up to `limit` ascending indices of `[0, total)` absent from
/// `present`.
///
/// Work and memory are bounded by `present.len() + limit`, never by `total`,
/// which is client-declared. `present` does not need to be sorted.
pub fn missing_indices(present: &[u32], total: u32, limit: usize) -> Vec<u32> {
    let present = distinct_below(present, total);
    let mut missing = Vec::new();
    let mut next = 0u32;
    for idx in present.into_iter().chain(std::iter::once(total)) {
        while next < idx {
            if missing.len() == limit {
                return missing;
            }
            missing.push(next);
            next += 1;
        }
        next = idx.saturating_add(1);
    }
    missing
}

/// Number of indices of `[0, total)` absent from `present`.
pub fn missing_count(present: &[u32], total: u32) -> u64 {
    u64::from(total) - distinct_below(present, total).len() as u64
}

fn distinct_below(present: &[u32], total: u32) -> Vec<u32> {
    let mut sorted: Vec<u32> = present.iter().copied().filter(|&i| i < total).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

/// Formats the average declared chunk size, e.g. `"4.00 MiB (4194304 bytes)"`.
pub fn describe_chunk_size(total_size: u64, total_chunks_num: u32) -> String {
    if total_chunks_num == 0 {
        return "unknown".into();
    }
    let per_chunk = total_size.div_ceil(u64::from(total_chunks_num));
    format!(
        "{:.2} MiB ({per_chunk} bytes)",
        per_chunk as f64 / (1024.0 * 1024.0)
    )
}
