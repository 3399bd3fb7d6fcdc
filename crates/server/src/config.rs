//! Server configuration.
//!
//! Stored as TOML, by default `chunkdrop.toml` in the working directory. A
//! missing file means every section takes its defaults:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! max_chunk_bytes = 52428800
//! cors_origins = []
//!
//! [storage]
//! root = "./data"
//!
//! [merge]
//! policy = "strict"
//!
//! [dedup]
//! algorithm = "sha256"
//! match_mode = "substring"
//! rebuild_on_check = false
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use chunkdrop_transfer::{EngineConfig, HashAlgorithm, MatchMode, MergePolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body limit for upload routes, in bytes.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Holds `temp/` and `completed/`.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub policy: MergePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default)]
    pub algorithm: HashAlgorithm,

    #[serde(default)]
    pub match_mode: MatchMode,

    /// Rehash the completed area before every instant-upload check.
    #[serde(default)]
    pub rebuild_on_check: bool,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3000
}

fn default_max_chunk_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_root() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_chunk_bytes: default_max_chunk_bytes(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            root: self.storage.root.clone(),
            merge_policy: self.merge.policy,
            hash_algorithm: self.dedup.algorithm,
            match_mode: self.dedup.match_mode,
            rebuild_on_check: self.dedup.rebuild_on_check,
        }
    }
}
