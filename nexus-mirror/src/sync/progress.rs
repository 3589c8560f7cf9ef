//! Progress tracking for a synchronization run.
//!
//! Counters are lock-free atomics shared by the paginator and every download
//! worker. Observers receive a [`ProgressSnapshot`] after each page dispatch
//! and after each item completion.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::mirror::DownloadOutcome;

/// Progress callback invoked with a point-in-time copy of the counters.
pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Shared counters for one run.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    found: AtomicU64,
    processed: AtomicU64,
    downloaded: AtomicU64,
    already_present: AtomicU64,
    checksum_mismatches: AtomicU64,
    io_failures: AtomicU64,
    cancelled: AtomicU64,
    bytes_downloaded: AtomicU64,
    pages: AtomicU64,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fetched page and the assets it lists.
    pub fn page_fetched(&self, items: usize) {
        self.pages.fetch_add(1, Ordering::SeqCst);
        self.found.fetch_add(items as u64, Ordering::SeqCst);
    }

    /// Record the terminal outcome of one asset.
    pub fn record(&self, outcome: &DownloadOutcome) {
        let tally = match outcome {
            DownloadOutcome::Downloaded { bytes, .. } => {
                self.bytes_downloaded.fetch_add(*bytes, Ordering::SeqCst);
                &self.downloaded
            }
            DownloadOutcome::AlreadyPresent => &self.already_present,
            DownloadOutcome::ChecksumMismatch { .. } => &self.checksum_mismatches,
            DownloadOutcome::IoFailure(_) => &self.io_failures,
            DownloadOutcome::Cancelled => &self.cancelled,
        };
        tally.fetch_add(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn found(&self) -> u64 {
        self.found.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        // `processed` is read before `found` so the snapshot never shows
        // more processed than found.
        let processed = self.processed();
        ProgressSnapshot {
            processed,
            found: self.found(),
            downloaded: self.downloaded.load(Ordering::SeqCst),
            already_present: self.already_present.load(Ordering::SeqCst),
            checksum_mismatches: self.checksum_mismatches.load(Ordering::SeqCst),
            io_failures: self.io_failures.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::SeqCst),
            pages: self.pages.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time copy of [`ProgressCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub found: u64,
    pub processed: u64,
    pub downloaded: u64,
    pub already_present: u64,
    pub checksum_mismatches: u64,
    pub io_failures: u64,
    pub cancelled: u64,
    pub bytes_downloaded: u64,
    pub pages: u64,
}

impl ProgressSnapshot {
    /// Assets that ended in a mismatch or an I/O failure.
    pub fn failures(&self) -> u64 {
        self.checksum_mismatches + self.io_failures
    }

    /// Processed share of found assets, 100 when nothing was found.
    pub fn percent(&self) -> f64 {
        if self.found == 0 {
            100.0
        } else {
            (self.processed as f64 / self.found as f64) * 100.0
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} processed of {} found", self.processed, self.found)
    }
}
