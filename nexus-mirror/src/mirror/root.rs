//! The local mirror directory and asset path resolution.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// Prefix of temporary mirror directories.
const TEMP_DIR_PREFIX: &str = "nexus3";

/// Errors validating the mirror root or resolving paths beneath it.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The configured directory is missing, not a directory, or not writable.
    #[error("not a writable directory: {}: {reason}", path.display())]
    DirectoryUnavailable { path: PathBuf, reason: String },

    #[error("failed to create mirror directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// An asset path would land outside the mirror root.
    #[error("asset path {path:?} escapes the mirror root")]
    UnsafePath { path: String },
}

/// A validated, writable directory that assets are mirrored into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRoot {
    path: PathBuf,
    temporary: bool,
}

impl MirrorRoot {
    /// Validate (or create) the mirror root.
    ///
    /// With `None` a fresh temporary directory is created and kept after the
    /// run. A caller-supplied directory must exist unless `create_missing` is
    /// set, must be a directory, and must be writable.
    pub fn prepare(path: Option<PathBuf>, create_missing: bool) -> Result<Self, MirrorError> {
        let Some(path) = path else {
            let dir = tempfile::Builder::new()
                .prefix(TEMP_DIR_PREFIX)
                .tempdir()
                .map_err(|e| MirrorError::CreateDirFailed {
                    path: std::env::temp_dir(),
                    source: e,
                })?;
            let path = dir.keep();
            info!(path = %path.display(), "Created temporary mirror directory");
            return Ok(Self {
                path,
                temporary: true,
            });
        };

        if !path.exists() {
            if !create_missing {
                return Err(MirrorError::DirectoryUnavailable {
                    path,
                    reason: "directory does not exist".to_string(),
                });
            }
            std::fs::create_dir_all(&path).map_err(|e| MirrorError::CreateDirFailed {
                path: path.clone(),
                source: e,
            })?;
            info!(path = %path.display(), "Created mirror directory");
        }

        if !path.is_dir() {
            return Err(MirrorError::DirectoryUnavailable {
                path,
                reason: "not a directory".to_string(),
            });
        }

        // Probe with a real file; permission bits alone miss ACLs and read-only mounts.
        if let Err(e) = tempfile::tempfile_in(&path) {
            return Err(MirrorError::DirectoryUnavailable {
                path,
                reason: e.to_string(),
            });
        }

        Ok(Self {
            path,
            temporary: false,
        })
    }

    /// Use `path` as-is, without validation.
    pub fn unchecked(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this root was created as a temporary directory.
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Resolve an asset's relative path beneath the root.
    ///
    /// Leading slashes are ignored. `..`, root and drive prefix components
    /// are rejected.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, MirrorError> {
        let unsafe_path = || MirrorError::UnsafePath {
            path: relative.to_string(),
        };

        let mut resolved = self.path.clone();
        let mut depth = 0usize;

        for component in Path::new(relative.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(unsafe_path());
                }
            }
        }

        if depth == 0 {
            return Err(unsafe_path());
        }
        Ok(resolved)
    }
}
