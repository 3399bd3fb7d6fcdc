use std::io::Read;
use std::path::Path;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::TransferError;

/// Digest used to fingerprint completed files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Md5,
}

impl HashAlgorithm {
    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Md5 => 32,
        }
    }
}

/// Computes the digest of `data` and returns it hex-encoded.
pub fn checksum_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        HashAlgorithm::Md5 => hex::encode(Md5::digest(data)),
    }
}

/// Computes the digest of an entire file and returns it hex-encoded.
///
/// Blocking; call from `spawn_blocking` on the async side.
pub fn calculate_file_checksum(
    algorithm: HashAlgorithm,
    path: &Path,
) -> Result<String, TransferError> {
    let file = std::fs::File::open(path)?;
    match algorithm {
        HashAlgorithm::Sha256 => digest_reader::<Sha256>(file),
        HashAlgorithm::Md5 => digest_reader::<Md5>(file),
    }
}

fn digest_reader<D: Digest>(mut reader: impl Read) -> Result<String, TransferError> {
    let mut hasher = D::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
