use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use chunkdrop_protocol::constants::{COMPLETED_DIR, TEMP_DIR};
use chunkdrop_protocol::{ChunksInfo, FileInfo, MetadataRecord};

use crate::{
    ChunkStore, CompletedArea, CompletedFile, DedupIndex, HashAlgorithm, MatchMode, MergeEngine,
    MergeOutcome, MergePolicy, MetadataLedger, SessionLocks, TransferError, list_uploaded,
};

/// Settings for [`UploadEngine::open`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Storage root holding `temp/` and `completed/`.
    pub root: PathBuf,
    pub merge_policy: MergePolicy,
    pub hash_algorithm: HashAlgorithm,
    pub match_mode: MatchMode,
    /// Rehash the whole completed area before every dedup check.
    pub rebuild_on_check: bool,
}

impl EngineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            merge_policy: MergePolicy::default(),
            hash_algorithm: HashAlgorithm::default(),
            match_mode: MatchMode::default(),
            rebuild_on_check: false,
        }
    }
}

/// Client-declared attributes sent with every chunk.
///
/// Only the values from the first chunk of a session are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUpload {
    pub upload_id: String,
    pub file_name: String,
    pub file_type: String,
    pub total_size: u64,
    pub total_chunks: u32,
    pub index: u32,
}

/// What the engine knows after persisting one chunk.
#[derive(Debug, Clone)]
pub struct ChunkReceipt {
    pub index: u32,
    pub chunk_size: u64,
    pub total_size: u64,
    pub uploaded_bytes: u64,
    pub record: MetadataRecord,
}

/// Ties the chunk store, ledger, merge engine and dedup index together.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct UploadEngine {
    store: ChunkStore,
    ledger: MetadataLedger,
    merger: MergeEngine,
    dedup: DedupIndex,
    completed: CompletedArea,
    locks: SessionLocks,
    rebuild_on_check: bool,
}

impl UploadEngine {
    /// Creates the storage directories and loads (or builds) the hash index.
    pub async fn open(config: EngineConfig) -> Result<Arc<Self>, TransferError> {
        let temp_root = config.root.join(TEMP_DIR);
        let completed_root = config.root.join(COMPLETED_DIR);
        tokio::fs::create_dir_all(&temp_root).await?;
        tokio::fs::create_dir_all(&completed_root).await?;

        let store = ChunkStore::new(temp_root);
        let ledger = MetadataLedger::new(store.clone());
        let merger = MergeEngine::new(
            store.clone(),
            ledger.clone(),
            completed_root.clone(),
            config.merge_policy,
        );
        let dedup =
            DedupIndex::open(completed_root.clone(), config.hash_algorithm, config.match_mode)
                .await?;

        tracing::info!(
            root = %config.root.display(),
            merge_policy = ?config.merge_policy,
            algorithm = ?config.hash_algorithm,
            match_mode = ?config.match_mode,
            "upload engine ready"
        );

        Ok(Arc::new(Self {
            store,
            ledger,
            merger,
            dedup,
            completed: CompletedArea::new(completed_root),
            locks: SessionLocks::new(),
            rebuild_on_check: config.rebuild_on_check,
        }))
    }

    pub fn completed_root(&self) -> &Path {
        self.completed.root()
    }

    /// Persists one chunk and brings the session ledger up to date.
    ///
    /// The first chunk of an unseen upload creates the ledger from the
    /// declared values in `upload`.
    pub async fn receive_chunk(
        &self,
        upload: &ChunkUpload,
        data: &[u8],
    ) -> Result<ChunkReceipt, TransferError> {
        let id = upload.upload_id.as_str();
        self.store.put(id, upload.index, data).await?;

        let record = {
            let _guard = self.locks.acquire(id).await;
            if !self.ledger.exists(id).await? {
                let now = Utc::now();
                let file_info = FileInfo {
                    file_name: upload.file_name.clone(),
                    file_hash: upload.upload_id.clone(),
                    file_size: upload.total_size,
                    file_type: upload.file_type.clone(),
                    start_time: now,
                };
                let chunks_info = ChunksInfo::declared(upload.total_size, upload.total_chunks, now);
                self.ledger.create(id, file_info, chunks_info).await?;
            }
            self.ledger.refresh(id).await?
        };

        let uploaded_bytes = self.store.uploaded_bytes(id).await?;
        Ok(ChunkReceipt {
            index: upload.index,
            chunk_size: data.len() as u64,
            total_size: upload.total_size,
            uploaded_bytes,
            record,
        })
    }

    /// Indices already persisted for `upload_id`, ascending.
    pub async fn uploaded_chunks(&self, upload_id: &str) -> Result<Vec<u32>, TransferError> {
        list_uploaded(&self.store, upload_id).await
    }

    /// Ledger record of an in-progress upload, if one exists.
    pub async fn session(&self, upload_id: &str) -> Result<Option<MetadataRecord>, TransferError> {
        self.ledger.load(upload_id).await
    }

    /// Merges `upload_id` into the completed area and indexes the result.
    ///
    /// Failing to index the merged file is logged and does not fail the
    /// merge; the next rebuild picks it up.
    pub async fn merge(&self, upload_id: &str, file_name: &str) -> Result<MergeOutcome, TransferError> {
        let outcome = {
            let _guard = self.locks.acquire(upload_id).await;
            self.merger.merge(upload_id, file_name).await?
        };

        if let Err(e) = self.dedup.record(&outcome.path).await {
            tracing::warn!(upload_id, error = %e, "failed to index merged file");
        }
        Ok(outcome)
    }

    /// Whether the completed area holds content matching `candidate`.
    pub async fn has_content(&self, candidate: &str) -> Result<bool, TransferError> {
        if self.rebuild_on_check {
            self.dedup.rebuild().await?;
        }
        let found = self.dedup.has_content(candidate).await;
        tracing::debug!(candidate, found, "dedup check");
        Ok(found)
    }

    /// Rehashes the completed area.
    pub async fn rebuild_index(&self) -> Result<usize, TransferError> {
        self.dedup.rebuild().await
    }

    /// Stores a single-shot upload and indexes it.
    pub async fn store_completed(
        &self,
        original_name: &str,
        data: &[u8],
    ) -> Result<CompletedFile, TransferError> {
        let stored = self.completed.store(original_name, data).await?;
        if let Err(e) = self.dedup.record(&stored.path).await {
            tracing::warn!(file = %stored.name, error = %e, "failed to index stored file");
        }
        Ok(stored)
    }

    pub async fn list_completed(&self) -> Result<Vec<CompletedFile>, TransferError> {
        self.completed.list().await
    }

    pub async fn find_completed(&self, stem: &str) -> Result<Option<CompletedFile>, TransferError> {
        self.completed.find_by_stem(stem).await
    }
}
