//! Repository synchronization.
//!
//! [`SyncEngine`] walks the catalog and hands every asset to the
//! [`ItemDownloader`](crate::mirror::ItemDownloader), either inline
//! ([`SequentialStrategy`]) or through a bounded worker pool
//! ([`PooledStrategy`]). Progress is tracked with lock-free counters and
//! summarized in a [`SyncReport`] when the run ends.

mod engine;
mod progress;
mod report;
mod strategy;

pub use engine::{SyncEngine, SyncError};
pub use progress::{ProgressCallback, ProgressCounters, ProgressSnapshot};
pub use report::SyncReport;
pub use strategy::{PooledStrategy, SequentialStrategy, StrategyResult, SyncContext, SyncStrategy};
