use std::path::{Path, PathBuf};

use chunkdrop_protocol::types::{missing_count, missing_indices};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::{ChunkStore, MetadataLedger, TransferError, validate_file_name};

/// Most missing indices carried by [`TransferError::IncompleteUpload`].
pub const MAX_REPORTED_MISSING: usize = 32;

/// Whether merge checks completeness against the declared chunk count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Present indices must be exactly `[0, totalChunksNum)`.
    #[default]
    Strict,
    /// Concatenate whatever is present. A premature merge yields a truncated
    /// or gapped file and still reports success.
    Lenient,
}

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub path: PathBuf,
    /// Size read back from the merged file.
    pub size: u64,
    /// Indices that were concatenated, in output order.
    pub chunks: Vec<u32>,
}

/// Concatenates persisted chunks into `<completed-root>/<fileName>`.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    store: ChunkStore,
    ledger: MetadataLedger,
    completed_root: PathBuf,
    policy: MergePolicy,
}

impl MergeEngine {
    pub fn new(
        store: ChunkStore,
        ledger: MetadataLedger,
        completed_root: impl Into<PathBuf>,
        policy: MergePolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            completed_root: completed_root.into(),
            policy,
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn completed_root(&self) -> &Path {
        &self.completed_root
    }

    /// Merges `upload_id` into a file named `file_name`.
    ///
    /// Chunks are appended in ascending numeric index order regardless of the
    /// order they arrived in. The output is assembled in the session's
    /// `incoming/` directory and renamed over `<completed-root>/<file_name>`
    /// only once every chunk has been copied, so a failed merge leaves any
    /// existing completed file with that name untouched. On success the
    /// session directory is deleted; on failure it is left in place.
    pub async fn merge(&self, upload_id: &str, file_name: &str) -> Result<MergeOutcome, TransferError> {
        validate_file_name(file_name)?;
        let chunks = self.store.list(upload_id).await?;

        if self.policy == MergePolicy::Strict {
            self.check_complete(upload_id, &chunks).await?;
        }

        tokio::fs::create_dir_all(&self.completed_root).await?;
        let path = self.completed_root.join(file_name);

        let incoming = self.store.incoming_dir(upload_id)?;
        tokio::fs::create_dir_all(&incoming).await?;
        let staging = incoming.join(format!("merge.{}", uuid::Uuid::new_v4().simple()));

        if let Err(e) = self.assemble(upload_id, &chunks, &staging).await {
            let _ = tokio::fs::remove_file(&staging).await;
            tracing::warn!(upload_id, file_name, error = %e, "merge failed");
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        self.store.remove_session(upload_id).await?;

        let size = tokio::fs::metadata(&path).await?.len();
        tracing::info!(
            upload_id,
            file_name,
            chunks = chunks.len(),
            size,
            policy = ?self.policy,
            "upload merged"
        );

        Ok(MergeOutcome { path, size, chunks })
    }

    async fn assemble(&self, upload_id: &str, chunks: &[u32], staging: &Path) -> Result<(), TransferError> {
        let mut out = tokio::fs::File::create(staging).await?;
        for &idx in chunks {
            let mut chunk = tokio::fs::File::open(self.store.chunk_path(upload_id, idx)?).await?;
            tokio::io::copy(&mut chunk, &mut out).await?;
        }
        out.flush().await?;
        out.sync_all().await?;
        Ok(())
    }

    async fn check_complete(&self, upload_id: &str, chunks: &[u32]) -> Result<(), TransferError> {
        let record = self
            .ledger
            .load(upload_id)
            .await?
            .ok_or_else(|| TransferError::MetadataMissing(upload_id.to_string()))?;
        let total = record.chunks_info.total_chunks_num;

        let missing_count = missing_count(chunks, total);
        if missing_count > 0 {
            let missing = missing_indices(chunks, total, MAX_REPORTED_MISSING);
            tracing::warn!(upload_id, missing_count, total, "refusing to merge incomplete upload");
            return Err(TransferError::IncompleteUpload {
                upload_id: upload_id.to_string(),
                missing,
                missing_count,
            });
        }

        let extra: Vec<u32> = chunks.iter().copied().filter(|&i| i >= total).collect();
        if !extra.is_empty() {
            return Err(TransferError::UnexpectedChunks {
                upload_id: upload_id.to_string(),
                extra,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chunkdrop_protocol::{ChunksInfo, FileInfo};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: ChunkStore,
        ledger: MetadataLedger,
        completed: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path().join("temp"));
        let ledger = MetadataLedger::new(store.clone());
        let completed = dir.path().join("completed");
        Fixture {
            _dir: dir,
            store,
            ledger,
            completed,
        }
    }

    impl Fixture {
        fn engine(&self, policy: MergePolicy) -> MergeEngine {
            MergeEngine::new(
                self.store.clone(),
                self.ledger.clone(),
                self.completed.clone(),
                policy,
            )
        }

        async fn declare(&self, upload_id: &str, total: u32) {
            let info = FileInfo {
                file_name: "out.bin".into(),
                file_hash: upload_id.into(),
                file_size: 6,
                file_type: String::new(),
                start_time: Utc::now(),
            };
            self.ledger
                .create(upload_id, info, ChunksInfo::declared(6, total, Utc::now()))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn concatenates_in_index_order() {
        let fx = fixture();
        fx.declare("u", 3).await;
        fx.store.put("u", 2, b"CC").await.unwrap();
        fx.store.put("u", 0, b"AA").await.unwrap();
        fx.store.put("u", 1, b"BB").await.unwrap();

        let outcome = fx.engine(MergePolicy::Strict).merge("u", "out.bin").await.unwrap();

        assert_eq!(std::fs::read(&outcome.path).unwrap(), b"AABBCC");
        assert_eq!(outcome.size, 6);
        assert_eq!(outcome.chunks, vec![0, 1, 2]);
        assert_eq!(outcome.path, fx.completed.join("out.bin"));
    }

    #[tokio::test]
    async fn numeric_not_lexicographic_order() {
        let fx = fixture();
        for idx in 0..11u32 {
            fx.store.put("u", idx, format!("{idx},").as_bytes()).await.unwrap();
        }

        let outcome = fx.engine(MergePolicy::Lenient).merge("u", "n.txt").await.unwrap();

        assert_eq!(
            std::fs::read_to_string(outcome.path).unwrap(),
            "0,1,2,3,4,5,6,7,8,9,10,"
        );
    }

    #[tokio::test]
    async fn session_directory_removed_after_merge() {
        let fx = fixture();
        fx.declare("u", 1).await;
        fx.store.put("u", 0, b"x").await.unwrap();

        fx.engine(MergePolicy::Strict).merge("u", "x.txt").await.unwrap();

        assert!(!fx.store.session_dir("u").unwrap().exists());
        assert!(!fx.store.metadata_path("u").unwrap().exists());
    }

    #[tokio::test]
    async fn lenient_merge_skips_gaps() {
        let fx = fixture();
        fx.declare("u", 3).await;
        fx.store.put("u", 0, b"AA").await.unwrap();
        fx.store.put("u", 2, b"CC").await.unwrap();

        let outcome = fx.engine(MergePolicy::Lenient).merge("u", "gap.bin").await.unwrap();

        assert_eq!(std::fs::read(outcome.path).unwrap(), b"AACC");
        assert_eq!(outcome.size, 4);
    }

    #[tokio::test]
    async fn strict_merge_reports_missing_indices() {
        let fx = fixture();
        fx.declare("u", 3).await;
        fx.store.put("u", 0, b"AA").await.unwrap();
        fx.store.put("u", 2, b"CC").await.unwrap();

        let err = fx
            .engine(MergePolicy::Strict)
            .merge("u", "gap.bin")
            .await
            .unwrap_err();

        match err {
            TransferError::IncompleteUpload {
                upload_id,
                missing,
                missing_count,
            } => {
                assert_eq!(upload_id, "u");
                assert_eq!(missing, vec![1]);
                assert_eq!(missing_count, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing written, nothing cleaned up.
        assert!(!fx.completed.join("gap.bin").exists());
        assert!(fx.store.chunks_dir("u").unwrap().exists());
    }

    #[tokio::test]
    async fn strict_merge_rejects_indices_past_declared_count() {
        let fx = fixture();
        fx.declare("u", 1).await;
        fx.store.put("u", 0, b"A").await.unwrap();
        fx.store.put("u", 4, b"E").await.unwrap();

        let err = fx.engine(MergePolicy::Strict).merge("u", "a").await.unwrap_err();
        assert!(matches!(err, TransferError::UnexpectedChunks { extra, .. } if extra == vec![4]));
    }

    #[tokio::test]
    async fn strict_merge_needs_metadata() {
        let fx = fixture();
        fx.store.put("u", 0, b"A").await.unwrap();

        let err = fx.engine(MergePolicy::Strict).merge("u", "a").await.unwrap_err();
        assert!(matches!(err, TransferError::MetadataMissing(_)));
    }

    #[tokio::test]
    async fn same_name_overwrites_previous_file() {
        let fx = fixture();
        let engine = fx.engine(MergePolicy::Lenient);
        fx.store.put("first", 0, b"old contents").await.unwrap();
        engine.merge("first", "same.txt").await.unwrap();
        fx.store.put("second", 0, b"new").await.unwrap();
        engine.merge("second", "same.txt").await.unwrap();

        assert_eq!(std::fs::read(fx.completed.join("same.txt")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn huge_declared_count_yields_short_error() {
        let fx = fixture();
        fx.declare("u", u32::MAX).await;
        fx.store.put("u", 0, b"A").await.unwrap();

        let err = fx.engine(MergePolicy::Strict).merge("u", "a").await.unwrap_err();
        match &err {
            TransferError::IncompleteUpload {
                missing,
                missing_count,
                ..
            } => {
                assert_eq!(missing.len(), MAX_REPORTED_MISSING);
                assert_eq!(missing[0], 1);
                assert_eq!(*missing_count, u64::from(u32::MAX) - 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().len() < 1024);
    }

    #[tokio::test]
    async fn failed_merge_keeps_existing_completed_file() {
        let fx = fixture();
        let engine = fx.engine(MergePolicy::Lenient);
        fx.store.put("first", 0, b"ORIGINAL").await.unwrap();
        engine.merge("first", "same.txt").await.unwrap();

        fx.store.put("second", 0, b"NEW").await.unwrap();
        // A directory in place of chunk 1 makes the copy fail mid-merge.
        std::fs::create_dir(fx.store.chunk_path("second", 1).unwrap()).unwrap();

        assert!(engine.merge("second", "same.txt").await.is_err());
        assert_eq!(std::fs::read(fx.completed.join("same.txt")).unwrap(), b"ORIGINAL");
        assert!(fx.store.chunks_dir("second").unwrap().exists());
        let incoming = fx.store.incoming_dir("second").unwrap();
        assert_eq!(std::fs::read_dir(incoming).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unsafe_file_name_is_rejected_before_writing() {
        let fx = fixture();
        fx.store.put("u", 0, b"x").await.unwrap();

        let err = fx
            .engine(MergePolicy::Lenient)
            .merge("u", "../escape.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidPath(_)));
        assert!(fx.store.chunks_dir("u").unwrap().exists());
    }
}
