//! File checksums for download verification.
//!
//! SHA-1 is what the repository declares for every asset and is the digest
//! verification uses; SHA-256 is used only for assets that lack a SHA-1.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::catalog::AssetChecksum;

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// A file could not be hashed.
#[derive(Debug, Error)]
#[error("failed to read {} for checksum: {source}", path.display())]
pub struct ChecksumError {
    pub path: PathBuf,
    pub source: io::Error,
}

fn hash_file<D: Digest>(path: &Path) -> Result<String, ChecksumError> {
    let read_failed = |source| ChecksumError {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_failed)?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(read_failed)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect())
}

/// Calculate the SHA-1 of a file as 40 lowercase hex characters.
pub fn sha1_file(path: &Path) -> Result<String, ChecksumError> {
    hash_file::<Sha1>(path)
}

/// Calculate the SHA-256 of a file as 64 lowercase hex characters.
pub fn sha256_file(path: &Path) -> Result<String, ChecksumError> {
    hash_file::<Sha256>(path)
}

/// The digest a downloaded file is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedDigest {
    Sha1(String),
    Sha256(String),
}

impl ExpectedDigest {
    /// Pick the digest to verify from an asset's declared checksums.
    ///
    /// Blank values are treated as absent.
    pub fn from_checksum(checksum: &AssetChecksum) -> Option<Self> {
        let declared = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        declared(&checksum.sha1)
            .map(ExpectedDigest::Sha1)
            .or_else(|| declared(&checksum.sha256).map(ExpectedDigest::Sha256))
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            ExpectedDigest::Sha1(_) => "sha1",
            ExpectedDigest::Sha256(_) => "sha256",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ExpectedDigest::Sha1(v) | ExpectedDigest::Sha256(v) => v,
        }
    }

    /// Hash `path` with this digest's algorithm.
    pub fn compute(&self, path: &Path) -> Result<String, ChecksumError> {
        match self {
            ExpectedDigest::Sha1(_) => sha1_file(path),
            ExpectedDigest::Sha256(_) => sha256_file(path),
        }
    }

    /// Whether a computed hex digest matches, ignoring case.
    pub fn matches(&self, actual: &str) -> bool {
        self.value().eq_ignore_ascii_case(actual)
    }
}
