//! Wire types for the chunkdrop upload API.
//!
//! Everything the HTTP surface sends or receives lives here, together with
//! the schema of the per-upload `metadata.json` record, so the engine and the
//! server agree on one set of field names.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

pub use envelope::ApiResponse;
pub use messages::{
    CheckRequest, CheckResponse, ChunkUploadResponse, FileDescriptor, HealthResponse,
    MergeRequest, ResourceQuery, SecondQuery,
};
pub use types::{ChunksInfo, FileInfo, MetadataRecord, SystemInfo};
