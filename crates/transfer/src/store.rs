use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chunkdrop_protocol::constants::{CHUNKS_DIR, INCOMING_DIR, METADATA_FILE};

use crate::{TransferError, validate_upload_id};

/// Durable placement of chunk bytes under `<temp-root>/<uploadId>/chunks/<index>`.
///
/// Writing the same index twice overwrites the earlier payload. Nothing checks
/// that an index is below the declared chunk count or that the chunk size
/// matches what the client declared.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    temp_root: PathBuf,
}

impl ChunkStore {
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
        }
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// `<temp-root>/<uploadId>`, holding `metadata.json` and `chunks/`.
    pub fn session_dir(&self, upload_id: &str) -> Result<PathBuf, TransferError> {
        validate_upload_id(upload_id)?;
        Ok(self.temp_root.join(upload_id))
    }

    pub fn chunks_dir(&self, upload_id: &str) -> Result<PathBuf, TransferError> {
        Ok(self.session_dir(upload_id)?.join(CHUNKS_DIR))
    }

    pub fn chunk_path(&self, upload_id: &str, index: u32) -> Result<PathBuf, TransferError> {
        Ok(self.chunks_dir(upload_id)?.join(index.to_string()))
    }

    /// `<temp-root>/<uploadId>/incoming`, where writes are staged before
    /// being renamed into place.
    pub fn incoming_dir(&self, upload_id: &str) -> Result<PathBuf, TransferError> {
        Ok(self.session_dir(upload_id)?.join(INCOMING_DIR))
    }

    pub fn metadata_path(&self, upload_id: &str) -> Result<PathBuf, TransferError> {
        Ok(self.session_dir(upload_id)?.join(METADATA_FILE))
    }

    /// Stores `bytes` as chunk `index` of `upload_id`.
    ///
    /// The payload is written to a uniquely named file in the sibling
    /// `incoming/` directory and renamed into `chunks/`, so a concurrent
    /// listing never observes a partially written chunk. Two writers racing
    /// on the same index both succeed; the last rename wins.
    pub async fn put(&self, upload_id: &str, index: u32, bytes: &[u8]) -> Result<(), TransferError> {
        let chunks = self.chunks_dir(upload_id)?;
        let incoming = self.incoming_dir(upload_id)?;

        // create_dir_all succeeds when another request created the tree first.
        tokio::fs::create_dir_all(&chunks).await?;
        tokio::fs::create_dir_all(&incoming).await?;

        let staging = incoming.join(format!("{index}.{}", uuid::Uuid::new_v4().simple()));
        let target = chunks.join(index.to_string());

        if let Err(e) = tokio::fs::write(&staging, bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!(upload_id, index, size = bytes.len(), "chunk stored");
        Ok(())
    }

    /// Indices present for `upload_id`, ascending.
    ///
    /// Returns an empty list when the chunk directory does not exist. Entries
    /// whose names do not parse as an index are skipped.
    pub async fn list(&self, upload_id: &str) -> Result<Vec<u32>, TransferError> {
        let dir = self.chunks_dir(upload_id)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut indices = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            match name.to_str().and_then(|n| n.parse::<u32>().ok()) {
                Some(idx) => indices.push(idx),
                None => tracing::trace!(upload_id, entry = ?name, "ignoring non-chunk entry"),
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    /// Sum of the sizes of every persisted chunk.
    pub async fn uploaded_bytes(&self, upload_id: &str) -> Result<u64, TransferError> {
        let mut total = 0u64;
        for idx in self.list(upload_id).await? {
            match tokio::fs::metadata(self.chunk_path(upload_id, idx)?).await {
                Ok(meta) => total += meta.len(),
                // Removed by a concurrent merge between listing and stat.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Deletes the whole session directory (metadata, chunks and staging).
    pub async fn remove_session(&self, upload_id: &str) -> Result<(), TransferError> {
        let dir = self.session_dir(upload_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ChunkStore {
        ChunkStore::new(dir.path().join("temp"))
    }

    #[tokio::test]
    async fn put_places_chunk_at_index_path() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.put("abc", 3, b"payload").await.unwrap();

        let path = dir.path().join("temp").join("abc").join("chunks").join("3");
        assert_eq!(std::fs::read(path).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn second_write_to_same_index_wins() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.put("abc", 0, b"first").await.unwrap();
        store.put("abc", 0, b"second!").await.unwrap();

        let bytes = std::fs::read(store.chunk_path("abc", 0).unwrap()).unwrap();
        assert_eq!(bytes, b"second!");
        assert_eq!(store.list("abc").await.unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn list_sorts_numerically() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        for idx in [10, 2, 0, 5] {
            store.put("abc", idx, b"x").await.unwrap();
        }

        assert_eq!(store.list("abc").await.unwrap(), vec![0, 2, 5, 10]);
    }

    #[tokio::test]
    async fn list_of_unknown_upload_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).list("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_skips_stray_entries() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.put("abc", 1, b"x").await.unwrap();
        std::fs::write(store.chunks_dir("abc").unwrap().join(".DS_Store"), b"").unwrap();

        assert_eq!(store.list("abc").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn staging_area_is_empty_after_put() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.put("abc", 0, b"x").await.unwrap();

        let incoming = store.incoming_dir("abc").unwrap();
        assert_eq!(std::fs::read_dir(incoming).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn concurrent_puts_same_session() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut handles = Vec::new();
        for idx in 0..16u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.put("race", idx, &[idx as u8; 8]).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.list("race").await.unwrap(), (0..16).collect::<Vec<_>>());
        assert_eq!(store.uploaded_bytes("race").await.unwrap(), 16 * 8);
    }

    #[tokio::test]
    async fn uploaded_bytes_sums_chunk_sizes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.put("abc", 0, b"1234").await.unwrap();
        store.put("abc", 1, b"56").await.unwrap();

        assert_eq!(store.uploaded_bytes("abc").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn remove_session_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.put("abc", 0, b"x").await.unwrap();

        store.remove_session("abc").await.unwrap();
        assert!(!store.session_dir("abc").unwrap().exists());
        store.remove_session("abc").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let result = store(&dir).put("../escape", 0, b"x").await;
        assert!(matches!(result, Err(TransferError::InvalidPath(_))));
    }
}
