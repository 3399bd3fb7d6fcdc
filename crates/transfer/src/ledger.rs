use std::io::ErrorKind;

use chrono::Utc;
use chunkdrop_protocol::{ChunksInfo, FileInfo, MetadataRecord, SystemInfo};

use crate::{ChunkStore, TransferError};

/// Owner of the per-upload `metadata.json`.
///
/// No other component writes the file. Callers serialize `create` and
/// `refresh` per upload through [`SessionLocks`](crate::SessionLocks).
#[derive(Debug, Clone)]
pub struct MetadataLedger {
    store: ChunkStore,
}

impl MetadataLedger {
    pub fn new(store: ChunkStore) -> Self {
        Self { store }
    }

    pub async fn exists(&self, upload_id: &str) -> Result<bool, TransferError> {
        Ok(tokio::fs::try_exists(self.store.metadata_path(upload_id)?).await?)
    }

    /// Writes the initial record from client-declared values.
    pub async fn create(
        &self,
        upload_id: &str,
        file_info: FileInfo,
        chunks_info: ChunksInfo,
    ) -> Result<MetadataRecord, TransferError> {
        let session = self.store.session_dir(upload_id)?;
        tokio::fs::create_dir_all(&session).await?;

        let record = MetadataRecord {
            file_info,
            chunks_info,
            system_info: SystemInfo::new(session.to_string_lossy()),
        };
        self.write(upload_id, &record).await?;

        tracing::info!(
            upload_id,
            file_name = %record.file_info.file_name,
            total_chunks = record.chunks_info.total_chunks_num,
            "upload session created"
        );
        Ok(record)
    }

    /// Re-reads the record, re-lists the chunk directory and rewrites
    /// `uploadedChunks` and `lastUpdated`.
    ///
    /// Fails with [`TransferError::MetadataMissing`] if the record was never
    /// created.
    pub async fn refresh(&self, upload_id: &str) -> Result<MetadataRecord, TransferError> {
        let mut record = self
            .load(upload_id)
            .await?
            .ok_or_else(|| TransferError::MetadataMissing(upload_id.to_string()))?;

        record.chunks_info.uploaded_chunks = self.store.list(upload_id).await?;
        record.chunks_info.last_updated = Utc::now();
        self.write(upload_id, &record).await?;

        tracing::debug!(
            upload_id,
            uploaded = record.chunks_info.uploaded_chunks.len(),
            total = record.chunks_info.total_chunks_num,
            "metadata refreshed"
        );
        Ok(record)
    }

    /// Parsed record, or `None` when no metadata has been written.
    pub async fn load(&self, upload_id: &str) -> Result<Option<MetadataRecord>, TransferError> {
        let path = self.store.metadata_path(upload_id)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn write(&self, upload_id: &str, record: &MetadataRecord) -> Result<(), TransferError> {
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.store.metadata_path(upload_id)?, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_info(hash: &str) -> FileInfo {
        FileInfo {
            file_name: "clip.mov".into(),
            file_hash: hash.into(),
            file_size: 9,
            file_type: "video/quicktime".into(),
            start_time: Utc::now(),
        }
    }

    fn setup() -> (TempDir, ChunkStore, MetadataLedger) {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path().join("temp"));
        let ledger = MetadataLedger::new(store.clone());
        (dir, store, ledger)
    }

    #[tokio::test]
    async fn create_writes_three_section_document() {
        let (_dir, store, ledger) = setup();
        ledger
            .create("h1", file_info("h1"), ChunksInfo::declared(9, 3, Utc::now()))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.metadata_path("h1").unwrap()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["fileInfo"]["fileName"], "clip.mov");
        assert_eq!(json["chunksInfo"]["totalChunksNum"], 3);
        assert!(
            json["systemInfo"]["storagePath"]
                .as_str()
                .unwrap()
                .ends_with("h1")
        );
    }

    #[tokio::test]
    async fn metadata_sits_beside_chunks_not_inside() {
        let (_dir, store, ledger) = setup();
        ledger
            .create("h1", file_info("h1"), ChunksInfo::declared(9, 3, Utc::now()))
            .await
            .unwrap();
        store.put("h1", 0, b"abc").await.unwrap();

        let meta = store.metadata_path("h1").unwrap();
        let chunks = store.chunks_dir("h1").unwrap();
        assert_eq!(meta.parent(), chunks.parent());
    }

    #[tokio::test]
    async fn refresh_recomputes_from_disk() {
        let (_dir, store, ledger) = setup();
        ledger
            .create("h1", file_info("h1"), ChunksInfo::declared(9, 3, Utc::now()))
            .await
            .unwrap();
        store.put("h1", 2, b"ccc").await.unwrap();
        store.put("h1", 0, b"aaa").await.unwrap();

        let record = ledger.refresh("h1").await.unwrap();
        assert_eq!(record.chunks_info.uploaded_chunks, vec![0, 2]);
        assert_eq!(record.missing_chunks(usize::MAX), vec![1]);

        let reloaded = ledger.load("h1").await.unwrap().unwrap();
        assert_eq!(reloaded, record);
    }

    #[tokio::test]
    async fn refresh_without_create_is_an_error() {
        let (_dir, store, ledger) = setup();
        store.put("orphan", 0, b"x").await.unwrap();

        let err = ledger.refresh("orphan").await.unwrap_err();
        assert!(matches!(err, TransferError::MetadataMissing(id) if id == "orphan"));
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let (_dir, _store, ledger) = setup();
        assert!(ledger.load("nope").await.unwrap().is_none());
        assert!(!ledger.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_metadata_is_json_error() {
        let (_dir, store, ledger) = setup();
        std::fs::create_dir_all(store.session_dir("bad").unwrap()).unwrap();
        std::fs::write(store.metadata_path("bad").unwrap(), b"{not json").unwrap();

        assert!(matches!(ledger.load("bad").await, Err(TransferError::Json(_))));
    }
}
