//! Arguments and helpers shared across CLI commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use nexus_mirror::config::{Credentials, SyncConfig, DEFAULT_CREDENTIALS_FILE};
use tracing::info;

use crate::error::CliError;

/// Where the repository lives and how to reach it.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Base URL of the Nexus 3 instance (e.g. http://nexus.example.com:8081)
    pub url: String,

    /// Repository id
    pub repository: String,

    /// Credentials file with authenticate, username and password keys
    /// [default: ./credentials.properties when present]
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub timeout: u64,
}

impl ConnectionArgs {
    /// Base run configuration for these connection settings.
    pub fn to_config(&self) -> Result<SyncConfig, CliError> {
        if self.timeout == 0 {
            return Err(CliError::Config("--timeout must be at least 1 second".to_string()));
        }

        let credentials = load_credentials(self.credentials.as_deref())?;

        Ok(SyncConfig::new(self.url.clone(), self.repository.clone())
            .with_credentials(credentials)
            .with_request_timeout(Duration::from_secs(self.timeout)))
    }
}

/// Load credentials from an explicit file, or from the default file if present.
///
/// An explicitly named file must exist.
pub fn load_credentials(explicit: Option<&Path>) -> Result<Option<Credentials>, CliError> {
    let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_CREDENTIALS_FILE));
    if explicit.is_some() && !path.is_file() {
        return Err(CliError::Config(format!(
            "Credentials file not found: {}",
            path.display()
        )));
    }

    let credentials = Credentials::load(path)?;
    match &credentials {
        Some(c) => info!(username = %c.username, file = %path.display(), "Using basic authentication"),
        None => info!("No authentication"),
    }

    Ok(credentials)
}
