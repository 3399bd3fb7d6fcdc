use crate::{ChunkStore, TransferError};

/// Chunk indices already persisted for `upload_id`, ascending.
///
/// This is the authoritative answer for resuming clients; the ledger's cached
/// list is only a snapshot. The chunk directory is created when missing, so a
/// first query for an unseen upload returns `[]` rather than failing.
pub async fn list_uploaded(store: &ChunkStore, upload_id: &str) -> Result<Vec<u32>, TransferError> {
    let dir = store.chunks_dir(upload_id)?;
    tokio::fs::create_dir_all(&dir).await?;
    store.list(upload_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn unseen_upload_gets_empty_directory() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path());

        assert!(list_uploaded(&store, "fresh").await.unwrap().is_empty());
        assert!(store.chunks_dir("fresh").unwrap().is_dir());
    }

    #[tokio::test]
    async fn reports_sparse_indices_in_order() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path());
        for idx in [5, 0, 2] {
            store.put("abc", idx, b"z").await.unwrap();
        }

        assert_eq!(list_uploaded(&store, "abc").await.unwrap(), vec![0, 2, 5]);
    }
}
