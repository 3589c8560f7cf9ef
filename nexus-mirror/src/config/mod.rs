//! Run configuration for a mirror synchronization.
//!
//! [`SyncConfig`] gathers everything the engine needs to know about a run:
//! where the repository lives, where the mirror goes, how to authenticate
//! and how much concurrency to use. Credentials are loaded separately from a
//! `credentials.properties` file (see [`credentials`]).

mod credentials;

use std::path::PathBuf;
use std::time::Duration;

pub use credentials::{strip_quotes, ConfigError, Credentials, DEFAULT_CREDENTIALS_FILE};

/// Default number of download workers in pooled mode.
pub const DEFAULT_WORKERS: usize = 10;

/// Default per-request HTTP timeout (5 minutes).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Download attempts per asset before a checksum mismatch is final.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Queued download jobs per worker in pooled mode.
const QUEUE_SLOTS_PER_WORKER: usize = 4;

/// How the engine schedules catalog pages and downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// One paginator feeding a fixed set of download workers.
    Pooled { workers: usize },
    /// Strictly sequential: fetch a page, download its items in order, repeat.
    Single,
}

impl Default for SyncMode {
    fn default() -> Self {
        SyncMode::Pooled {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Configuration for one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the repository manager, e.g. `https://nexus.example.com`.
    pub base_url: String,

    /// Identifier of the repository to mirror.
    pub repository: String,

    /// Local mirror directory. `None` mirrors into a fresh temporary directory.
    pub mirror_path: Option<PathBuf>,

    /// Create `mirror_path` when it does not exist instead of failing.
    pub create_missing_dir: bool,

    /// HTTP Basic credentials, applied to listing and download requests.
    pub credentials: Option<Credentials>,

    /// Scheduling mode.
    pub mode: SyncMode,

    /// Timeout applied to every HTTP request, including body transfer.
    pub request_timeout: Duration,

    /// Soft stop for pooled mode. `None` waits until all work has drained.
    pub drain_timeout: Option<Duration>,

    /// Capacity of the pooled-mode job queue. `None` derives it from workers.
    pub queue_capacity: Option<usize>,

    /// Download attempts per asset on checksum mismatch.
    pub max_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            repository: String::new(),
            mirror_path: None,
            create_missing_dir: false,
            credentials: None,
            mode: SyncMode::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            drain_timeout: None,
            queue_capacity: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SyncConfig {
    /// Create a configuration for the given repository.
    pub fn new(base_url: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            repository: repository.into(),
            ..Default::default()
        }
    }

    /// Set the local mirror directory.
    pub fn with_mirror_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror_path = Some(path.into());
        self
    }

    /// Create the mirror directory if it is missing.
    pub fn with_create_missing_dir(mut self, create: bool) -> Self {
        self.create_missing_dir = create;
        self
    }

    /// Set (or clear) HTTP Basic credentials.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Use pooled mode with the given number of workers (minimum 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.mode = SyncMode::Pooled {
            workers: workers.max(1),
        };
        self
    }

    /// Use strictly sequential mode.
    pub fn single(mut self) -> Self {
        self.mode = SyncMode::Single;
        self
    }

    /// Set the per-request HTTP timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Stop pooled mode after `timeout` even if work remains.
    pub fn with_drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Set the pooled-mode job queue capacity (minimum 1).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity.max(1));
        self
    }

    /// Set the number of download attempts per asset (minimum 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Whether the repository is reached over TLS.
    pub fn is_secure(&self) -> bool {
        self.base_url
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
    }

    /// Effective pooled-mode queue capacity.
    pub fn effective_queue_capacity(&self) -> usize {
        match (self.queue_capacity, self.mode) {
            (Some(capacity), _) => capacity,
            (None, SyncMode::Pooled { workers }) => workers.max(1) * QUEUE_SLOTS_PER_WORKER,
            (None, SyncMode::Single) => 1,
        }
    }
}
