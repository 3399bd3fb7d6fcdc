//! Directory names, file names and route paths shared across crates.

/// Directory under the storage root holding in-progress uploads.
pub const TEMP_DIR: &str = "temp";

/// Directory under the storage root holding merged and single-shot files.
pub const COMPLETED_DIR: &str = "completed";

/// Per-upload directory holding one file per chunk index.
pub const CHUNKS_DIR: &str = "chunks";

/// Per-upload staging directory; sibling of [`CHUNKS_DIR`].
pub const INCOMING_DIR: &str = "incoming";

/// Per-upload ledger file name.
pub const METADATA_FILE: &str = "metadata.json";

/// Content-hash index file inside [`COMPLETED_DIR`].
pub const HASH_INDEX_FILE: &str = "hashes.json";

/// Schema version written to `systemInfo.version`.
pub const METADATA_VERSION: &str = "1.0";

pub const ROUTE_LARGE_CHUNK: &str = "/upload/largeChunk";
pub const ROUTE_LARGE_CHECK: &str = "/upload/largeCheck";
pub const ROUTE_LARGE_MERGE: &str = "/upload/largeMerge";
pub const ROUTE_LARGE_SECOND: &str = "/upload/largeSecond";
pub const ROUTE_LARGE_STATUS: &str = "/upload/largeStatus";
pub const ROUTE_UPLOAD: &str = "/upload";
pub const ROUTE_RESOURCES: &str = "/upload/resources";
pub const ROUTE_GET_RESOURCE: &str = "/upload/getResource";
pub const ROUTE_DOWNLOAD: &str = "/upload/{file_name}";
pub const ROUTE_HEALTH: &str = "/health";
