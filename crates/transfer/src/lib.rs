//! Resumable chunked upload engine.
//!
//! Clients send a large file as independently transmitted chunks keyed by a
//! client-chosen fingerprint (`fileHash`). The engine places each chunk on
//! disk, keeps a per-upload JSON ledger in sync with what has landed, merges
//! the chunks in ascending index order once the client asks for it, and keeps
//! a content-hash index of completed files so clients can skip re-uploading
//! content the server already holds.
//!
//! On-disk layout under the storage root:
//!
//! ```text
//! temp/<fileHash>/metadata.json
//! temp/<fileHash>/chunks/<index>
//! temp/<fileHash>/incoming/<index>.<nonce>   (staging, transient)
//! temp/<fileHash>/incoming/merge.<nonce>     (merge output, transient)
//! completed/<fileName>
//! completed/hashes.json
//! ```

mod checksum;
mod completed;
mod dedup;
mod engine;
mod ledger;
mod locks;
mod merge;
mod progress;
mod store;
mod validation;

pub use checksum::{HashAlgorithm, calculate_file_checksum, checksum_bytes};
pub use completed::{CompletedArea, CompletedFile};
pub use dedup::{DedupIndex, MatchMode};
pub use engine::{ChunkReceipt, ChunkUpload, EngineConfig, UploadEngine};
pub use ledger::MetadataLedger;
pub use locks::{SessionGuard, SessionLocks};
pub use merge::{MAX_REPORTED_MISSING, MergeEngine, MergeOutcome, MergePolicy};
pub use progress::list_uploaded;
pub use store::ChunkStore;
pub use validation::{validate_file_name, validate_upload_id};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata missing for upload {0}")]
    MetadataMissing(String),

    /// `missing` holds at most the first few absent indices; `missing_count`
    /// is the full number.
    #[error("upload {upload_id} is incomplete: {missing_count} chunks missing, first {missing:?}")]
    IncompleteUpload {
        upload_id: String,
        missing: Vec<u32>,
        missing_count: u64,
    },

    #[error("upload {upload_id} has chunks beyond the declared count: {extra:?}")]
    UnexpectedChunks { upload_id: String, extra: Vec<u32> },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
