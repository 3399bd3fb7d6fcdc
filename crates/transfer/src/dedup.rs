use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chunkdrop_protocol::constants::HASH_INDEX_FILE;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{HashAlgorithm, TransferError, calculate_file_checksum};

/// How a client-claimed fingerprint is compared against stored digests.
///
/// `Substring` answers "does any stored digest contain the candidate", which
/// also accepts hash prefixes and any other fragment of a digest. Short
/// candidates therefore produce false positives. The candidate is compared
/// as given, so an uppercase fragment never matches the lowercase hex digests.
/// `Exact` requires the full digest, ignoring surrounding whitespace and
/// letter case. An empty candidate never matches in either mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Substring,
    Exact,
}

impl MatchMode {
    fn matches(self, digest: &str, candidate: &str) -> bool {
        match self {
            Self::Substring => digest.contains(candidate),
            Self::Exact => digest.eq_ignore_ascii_case(candidate.trim()),
        }
    }
}

/// Content digest → completed-file paths, persisted as `completed/hashes.json`.
///
/// Files with identical content share a digest, so each digest maps to the
/// set of paths holding it.
///
/// Kept current incrementally: [`record`](Self::record) is called for every
/// file that lands in the completed area. [`rebuild`](Self::rebuild) rehashes
/// every completed file from scratch.
#[derive(Debug)]
pub struct DedupIndex {
    completed_root: PathBuf,
    algorithm: HashAlgorithm,
    mode: MatchMode,
    entries: RwLock<Entries>,
}

impl DedupIndex {
    /// Loads the persisted index, or rebuilds it when the file is missing,
    /// unreadable, or was written with a different digest algorithm.
    pub async fn open(
        completed_root: impl Into<PathBuf>,
        algorithm: HashAlgorithm,
        mode: MatchMode,
    ) -> Result<Self, TransferError> {
        let completed_root = completed_root.into();
        tokio::fs::create_dir_all(&completed_root).await?;

        let index = Self {
            completed_root,
            algorithm,
            mode,
            entries: RwLock::new(BTreeMap::new()),
        };

        match index.load_persisted().await {
            Ok(Some(entries)) => {
                tracing::debug!(entries = entries.len(), "hash index loaded");
                *index.entries.write().await = entries;
            }
            Ok(None) => {
                index.rebuild().await?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "hash index unusable, rebuilding");
                index.rebuild().await?;
            }
        }
        Ok(index)
    }

    pub fn index_path(&self) -> PathBuf {
        self.completed_root.join(HASH_INDEX_FILE)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Rehashes every file in the completed area and overwrites the
    /// persisted index. Returns the number of entries.
    pub async fn rebuild(&self) -> Result<usize, TransferError> {
        let files = completed_files(&self.completed_root).await?;
        let algorithm = self.algorithm;

        let fresh = tokio::task::spawn_blocking(move || {
            let mut map = Entries::new();
            for path in files {
                match calculate_file_checksum(algorithm, &path) {
                    Ok(digest) => {
                        map.entry(digest)
                            .or_default()
                            .insert(path.to_string_lossy().into_owned());
                    }
                    // Removed between listing and hashing.
                    Err(TransferError::Io(e)) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
            Ok::<_, TransferError>(map)
        })
        .await??;

        let mut entries = self.entries.write().await;
        *entries = fresh;
        self.persist(&entries).await?;
        tracing::info!(entries = entries.len(), algorithm = ?self.algorithm, "hash index rebuilt");
        Ok(entries.len())
    }

    /// Hashes one completed file and adds it to the index. A previous digest
    /// recorded for the same path is dropped; other paths sharing that digest
    /// keep it. Returns the digest.
    pub async fn record(&self, path: &Path) -> Result<String, TransferError> {
        let algorithm = self.algorithm;
        let owned = path.to_path_buf();
        let digest =
            tokio::task::spawn_blocking(move || calculate_file_checksum(algorithm, &owned)).await??;
        let path_str = path.to_string_lossy().into_owned();

        let mut entries = self.entries.write().await;
        entries.retain(|_, paths| {
            paths.remove(&path_str);
            !paths.is_empty()
        });
        entries.entry(digest.clone()).or_default().insert(path_str);
        self.persist(&entries).await?;

        tracing::debug!(digest = %digest, path = %path.display(), "hash index updated");
        Ok(digest)
    }

    /// Whether any indexed file matches `candidate` under the configured
    /// [`MatchMode`].
    pub async fn has_content(&self, candidate: &str) -> bool {
        self.lookup(candidate).await.is_some()
    }

    /// Path of the first indexed file matching `candidate`.
    pub async fn lookup(&self, candidate: &str) -> Option<String> {
        if candidate.trim().is_empty() {
            return None;
        }
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|(digest, _)| self.mode.matches(digest, candidate))
            .and_then(|(_, paths)| paths.first().cloned())
    }

    /// Number of distinct digests.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn load_persisted(&self) -> Result<Option<Entries>, TransferError> {
        let raw = match tokio::fs::read(self.index_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entries: Entries = serde_json::from_slice(&raw)?;

        let expected = self.algorithm.hex_len();
        if entries.keys().any(|k| k.len() != expected) {
            tracing::info!(algorithm = ?self.algorithm, "hash index written with another algorithm");
            return Ok(None);
        }
        Ok(Some(entries))
    }

    async fn persist(&self, entries: &Entries) -> Result<(), TransferError> {
        let json = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(self.index_path(), json).await?;
        Ok(())
    }
}

type Entries = BTreeMap<String, BTreeSet<String>>;

/// Regular files directly under `root`, excluding the index file.
async fn completed_files(root: &Path) -> Result<Vec<PathBuf>, TransferError> {
    let mut dir = match tokio::fs::read_dir(root).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        if entry.file_name() == HASH_INDEX_FILE {
            continue;
        }
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
