//! Summary of a finished synchronization run.

use std::fmt;
use std::time::Duration;

use super::progress::ProgressSnapshot;
use crate::catalog::PaginationEnd;

/// Final state of a run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Counters at the end of the run.
    pub progress: ProgressSnapshot,
    /// Set when a listing request failed; later pages were never discovered.
    pub listing_error: Option<String>,
    /// How pagination ended, if it did.
    pub pagination_end: Option<PaginationEnd>,
    /// Cancellation was requested by the caller.
    pub cancelled: bool,
    /// The pooled-mode drain timeout expired before all work finished.
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl SyncReport {
    /// Every discovered asset is present and verified, and the whole
    /// catalog was listed.
    pub fn is_complete(&self) -> bool {
        self.listing_error.is_none()
            && !self.stopped_early()
            && self.progress.processed == self.progress.found
            && self.progress.cancelled == 0
            && !self.has_failures()
    }

    /// Whether any asset ended in a checksum mismatch or an I/O failure.
    pub fn has_failures(&self) -> bool {
        self.progress.failures() > 0
    }

    /// Number of assets that ended in a failure.
    pub fn failure_count(&self) -> u64 {
        self.progress.failures()
    }

    /// The run stopped on cancellation or the drain timeout.
    pub fn stopped_early(&self) -> bool {
        self.cancelled || self.timed_out
    }

    /// Assets discovered but never processed.
    pub fn unprocessed(&self) -> u64 {
        self.progress.found.saturating_sub(self.progress.processed)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.progress;
        write!(
            f,
            "{} ({} downloaded, {} already present, {} checksum mismatches, {} I/O failures) \
             across {} pages in {:.1}s",
            p,
            p.downloaded,
            p.already_present,
            p.checksum_mismatches,
            p.io_failures,
            p.pages,
            self.elapsed.as_secs_f64()
        )
    }
}
