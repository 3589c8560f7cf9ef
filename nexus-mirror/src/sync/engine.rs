//! Synchronization engine.
//!
//! Ties a catalog source, an item downloader and a scheduling strategy
//! together and turns one run into a [`SyncReport`].

use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::progress::{ProgressCallback, ProgressCounters};
use super::report::SyncReport;
use super::strategy::{PooledStrategy, SequentialStrategy, StrategyResult, SyncContext, SyncStrategy};
use crate::catalog::{CatalogClient, CatalogSource, FetchError};
use crate::config::{SyncConfig, SyncMode};
use crate::mirror::{ItemDownloader, MirrorError, MirrorRoot};
use crate::transport::{AssetTransport, HttpSettings, ReqwestTransport, TransportError};

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Mirror directory error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] FetchError),

    #[error("HTTP client error: {0}")]
    Transport(#[from] TransportError),
}

/// Mirrors one repository into a local directory.
///
/// # Example
///
/// ```ignore
/// use nexus_mirror::config::SyncConfig;
/// use nexus_mirror::sync::SyncEngine;
///
/// let config = SyncConfig::new("http://nexus.example.com", "maven-releases")
///     .with_mirror_path("/srv/mirror");
/// let engine = SyncEngine::from_config(&config)?;
/// let report = engine.run(None);
/// println!("{}", report);
/// ```
pub struct SyncEngine<C, T> {
    source: C,
    downloader: ItemDownloader<T>,
    mode: SyncMode,
    pooled: PooledStrategy,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
}

impl<C: CatalogSource, T: AssetTransport> SyncEngine<C, T> {
    /// Create an engine from its parts. The mirror root must already be prepared.
    pub fn new(source: C, transport: T, root: MirrorRoot, config: &SyncConfig) -> Self {
        let workers = match config.mode {
            SyncMode::Pooled { workers } => workers,
            SyncMode::Single => 1,
        };
        let pooled = PooledStrategy::new(workers, config.effective_queue_capacity())
            .with_drain_timeout(config.drain_timeout);

        Self {
            source,
            downloader: ItemDownloader::new(transport, root).with_max_attempts(config.max_attempts),
            mode: config.mode,
            pooled,
            cancel: CancellationToken::new(),
            on_progress: None,
        }
    }

    /// Invoke `callback` after every page and every processed asset.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn mirror_root(&self) -> &MirrorRoot {
        self.downloader.root()
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Mirror the repository, starting at `start_token` (`None` for the beginning).
    ///
    /// Counters start from zero on every call. Outcomes of individual assets
    /// never abort the run; they are tallied in the returned report.
    pub fn run(&self, start_token: Option<String>) -> SyncReport {
        let counters = ProgressCounters::new();
        let run_token = self.cancel.child_token();
        let started = Instant::now();

        info!(
            root = %self.mirror_root().path().display(),
            mode = ?self.mode,
            "Starting repository sync"
        );

        let ctx = SyncContext {
            source: &self.source,
            downloader: &self.downloader,
            counters: &counters,
            cancel: &run_token,
            on_progress: self.on_progress.as_ref(),
        };

        let result: StrategyResult = match self.mode {
            SyncMode::Pooled { .. } => self.pooled.execute(&ctx, start_token),
            SyncMode::Single => SequentialStrategy::new().execute(&ctx, start_token),
        };

        let report = SyncReport {
            progress: counters.snapshot(),
            listing_error: result.listing_error.map(|e| e.to_string()),
            pagination_end: result.pagination_end,
            cancelled: self.cancel.is_cancelled(),
            timed_out: result.timed_out,
            elapsed: started.elapsed(),
        };

        if report.is_complete() {
            info!(
                processed = report.progress.processed,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Repository sync complete"
            );
        } else {
            warn!(
                processed = report.progress.processed,
                found = report.progress.found,
                failures = report.failure_count(),
                "Repository sync finished with problems"
            );
        }

        report
    }
}

impl SyncEngine<CatalogClient, ReqwestTransport> {
    /// Build an HTTP-backed engine from configuration.
    ///
    /// The base URL is validated before the mirror directory is touched, so a
    /// typo never leaves an empty temporary directory behind.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let settings = HttpSettings::from_config(config);
        let client = settings.build_client()?;
        let source = CatalogClient::new(
            client.clone(),
            config.base_url.clone(),
            config.repository.clone(),
            config.credentials.clone(),
        )?;

        let root = MirrorRoot::prepare(config.mirror_path.clone(), config.create_missing_dir)?;
        let transport = ReqwestTransport::new(client, config.credentials.clone(), settings.timeout);

        Ok(Self::new(source, transport, root, config))
    }
}
