//! Download of a single asset into the mirror, with checksum-verified retry.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::checksum::{ChecksumError, ExpectedDigest};
use super::root::{MirrorError, MirrorRoot};
use crate::catalog::Asset;
use crate::config::DEFAULT_MAX_ATTEMPTS;
use crate::transport::{AssetTransport, TransportError};

/// Buffer size for streaming asset content to disk (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Terminal result of downloading one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Written and, when a checksum was declared, verified.
    Downloaded { attempts: u32, bytes: u64 },
    /// The target file already existed; nothing was transferred.
    AlreadyPresent,
    /// Every attempt produced content with the wrong digest. The file is
    /// left as the last attempt wrote it.
    ChecksumMismatch {
        expected: String,
        actual: String,
        attempts: u32,
    },
    /// A transport or filesystem error other than a checksum mismatch.
    IoFailure(String),
    /// Cancellation was requested before the transfer completed.
    Cancelled,
}

impl DownloadOutcome {
    /// Whether the asset is present in the mirror with acceptable content.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            DownloadOutcome::Downloaded { .. } | DownloadOutcome::AlreadyPresent
        )
    }
}

/// Failures that end an asset's attempt sequence as [`DownloadOutcome::IoFailure`].
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Path(#[from] MirrorError),

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed reading content of {url}: {source}")]
    ReadFailed { url: String, source: io::Error },

    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}

/// Downloads assets beneath a mirror root.
#[derive(Debug)]
pub struct ItemDownloader<T> {
    transport: T,
    root: MirrorRoot,
    max_attempts: u32,
}

impl<T: AssetTransport> ItemDownloader<T> {
    pub fn new(transport: T, root: MirrorRoot) -> Self {
        Self {
            transport,
            root,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the number of attempts made on checksum mismatch (minimum 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn root(&self) -> &MirrorRoot {
        &self.root
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Download one asset. Never fails: every error becomes an outcome.
    pub fn download(&self, asset: &Asset, cancel: &CancellationToken) -> DownloadOutcome {
        debug!(url = %asset.download_url, "Downloading asset");

        match self.try_download(asset, cancel) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(url = %asset.download_url, error = %e, "Failed to download asset");
                DownloadOutcome::IoFailure(e.to_string())
            }
        }
    }

    fn try_download(
        &self,
        asset: &Asset,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, DownloadError> {
        let target = self.root.resolve(&asset.path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| DownloadError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let expected = ExpectedDigest::from_checksum(&asset.checksum);
        let mut actual = String::new();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Ok(DownloadOutcome::Cancelled);
            }

            // Only the first attempt may find a file it did not write itself.
            let file = if attempt == 1 {
                match OpenOptions::new().write(true).create_new(true).open(&target) {
                    Ok(file) => file,
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists && target.is_file() => {
                        info!(path = %asset.path, "Asset already exists, skipping");
                        return Ok(DownloadOutcome::AlreadyPresent);
                    }
                    Err(e) => return Err(write_failed(&target, e)),
                }
            } else {
                File::create(&target).map_err(|e| write_failed(&target, e))?
            };

            let bytes = match self.transfer(&asset.download_url, file, &target, cancel) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    discard_partial(&target);
                    return Ok(DownloadOutcome::Cancelled);
                }
                Err(e) => {
                    discard_partial(&target);
                    return Err(e);
                }
            };

            let Some(expected) = &expected else {
                warn!(path = %asset.path, "Asset declares no checksum, skipping verification");
                return Ok(DownloadOutcome::Downloaded {
                    attempts: attempt,
                    bytes,
                });
            };

            actual = expected.compute(&target)?;
            if expected.matches(&actual) {
                return Ok(DownloadOutcome::Downloaded {
                    attempts: attempt,
                    bytes,
                });
            }

            warn!(
                path = %asset.path,
                attempt,
                max_attempts = self.max_attempts,
                algorithm = expected.algorithm(),
                expected = expected.value(),
                actual = %actual,
                "Checksum mismatch"
            );
        }

        let expected = expected.map(|e| e.value().to_string()).unwrap_or_default();
        error!(path = %asset.path, "Checksum still mismatched after all attempts");
        Ok(DownloadOutcome::ChecksumMismatch {
            expected,
            actual,
            attempts: self.max_attempts,
        })
    }

    /// Stream content into `file`. Returns `None` if cancelled mid-transfer.
    fn transfer(
        &self,
        url: &str,
        file: File,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, DownloadError> {
        let mut reader = self.transport.open(url)?;
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(DownloadError::ReadFailed {
                        url: url.to_string(),
                        source: e,
                    })
                }
            };

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| write_failed(dest, e))?;
            written += bytes_read as u64;
        }

        writer.flush().map_err(|e| write_failed(dest, e))?;
        Ok(Some(written))
    }
}

fn write_failed(path: &Path, source: io::Error) -> DownloadError {
    DownloadError::WriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

/// Remove a partially written file so a later run downloads it again.
fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial download");
        }
    }
}
