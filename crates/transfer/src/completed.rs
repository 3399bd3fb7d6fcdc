use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chunkdrop_protocol::constants::HASH_INDEX_FILE;
use rand::Rng;

use crate::{TransferError, validate_file_name};

/// A file in the completed area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl CompletedFile {
    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// Read access to `<root>/completed` and storage of single-shot uploads.
#[derive(Debug, Clone)]
pub struct CompletedArea {
    root: PathBuf,
}

impl CompletedArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every regular file except the hash index, sorted by name.
    pub async fn list(&self) -> Result<Vec<CompletedFile>, TransferError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name == HASH_INDEX_FILE {
                continue;
            }
            files.push(CompletedFile {
                name,
                path: entry.path(),
                size: meta.len(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// First file (by name) whose stem equals `stem`.
    pub async fn find_by_stem(&self, stem: &str) -> Result<Option<CompletedFile>, TransferError> {
        Ok(self.list().await?.into_iter().find(|f| f.stem() == stem))
    }

    /// Stores a single-shot upload under `<millis>_<9 base36 chars><ext>`, keeping
    /// only the extension of `original_name`.
    pub async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<CompletedFile, TransferError> {
        let name = unique_name(original_name);
        validate_file_name(&name)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(original = original_name, stored = %name, size = bytes.len(), "file stored");
        Ok(CompletedFile {
            name,
            path,
            size: bytes.len() as u64,
        })
    }
}

fn unique_name(original_name: &str) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("{millis}_{suffix}{ext}")
}
