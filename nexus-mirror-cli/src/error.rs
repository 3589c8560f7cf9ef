//! CLI error types.

use thiserror::Error;

use nexus_mirror::catalog::FetchError;
use nexus_mirror::config::ConfigError;
use nexus_mirror::sync::SyncError;
use nexus_mirror::transport::TransportError;

/// Errors that stop the CLI before a run can start.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid arguments or setup.
    #[error("{0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Catalog(#[from] FetchError),
}
