//! Synchronization strategies.
//!
//! Both strategies implement the same algorithm: walk the catalog page by
//! page and download every listed asset. They differ only in concurrency.
//!
//! ```text
//! SequentialStrategy:  page ──► item, item, item ──► page ──► ...
//!
//! PooledStrategy:      paginator ──► bounded queue ──► worker 1..N
//!                      (caller)      (backpressure)    (ItemDownloader)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::progress::{ProgressCallback, ProgressCounters};
use crate::catalog::{Asset, CatalogPage, CatalogPages, CatalogSource, FetchError, PaginationEnd};
use crate::mirror::{DownloadOutcome, ItemDownloader};
use crate::transport::AssetTransport;

/// Everything a strategy needs for one run.
pub struct SyncContext<'a, C: ?Sized, T> {
    pub source: &'a C,
    pub downloader: &'a ItemDownloader<T>,
    pub counters: &'a ProgressCounters,
    /// Run-scoped token; strategies may cancel it to stop their own workers.
    pub cancel: &'a CancellationToken,
    pub on_progress: Option<&'a ProgressCallback>,
}

impl<C: CatalogSource + ?Sized, T: AssetTransport> SyncContext<'_, C, T> {
    fn report_progress(&self) {
        let snapshot = self.counters.snapshot();
        info!("{}", snapshot);
        if let Some(callback) = self.on_progress {
            callback(snapshot);
        }
    }

    fn page_dispatched(&self, page: &CatalogPage) {
        self.counters.page_fetched(page.items.len());
        debug!(items = page.items.len(), last = page.is_last(), "Fetched catalog page");
        self.report_progress();
    }

    fn listing_failed(&self, error: &FetchError) {
        error!(error = %error, "Error retrieving available assets to download");
        error!(
            "Check the repository URL and id, and the credentials file if the \
             repository requires authentication"
        );
    }

    /// Download one asset and account for it exactly once.
    fn process(&self, asset: &Asset) {
        let outcome = self.downloader.download(asset, self.cancel);
        self.counters.record(&outcome);
        self.report_progress();
    }

    /// Account for an asset that was listed but never started.
    fn skip(&self) {
        self.counters.record(&DownloadOutcome::Cancelled);
    }
}

/// How a strategy finished.
#[derive(Debug, Default)]
pub struct StrategyResult {
    pub listing_error: Option<FetchError>,
    pub pagination_end: Option<PaginationEnd>,
    pub timed_out: bool,
}

/// A way of scheduling pagination and downloads.
pub trait SyncStrategy: Send + Sync {
    /// Run to completion, starting at `start_token` (`None` for the first page).
    fn execute<C, T>(&self, ctx: &SyncContext<'_, C, T>, start_token: Option<String>) -> StrategyResult
    where
        C: CatalogSource + ?Sized,
        T: AssetTransport;
}

/// Fetch a page, download its items in page order, repeat.
///
/// A listing failure ends the run immediately.
#[derive(Debug, Default)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SyncStrategy for SequentialStrategy {
    fn execute<C, T>(&self, ctx: &SyncContext<'_, C, T>, start_token: Option<String>) -> StrategyResult
    where
        C: CatalogSource + ?Sized,
        T: AssetTransport,
    {
        let mut pages = CatalogPages::new(ctx.source, start_token);
        let mut listing_error = None;

        while !ctx.cancel.is_cancelled() {
            let Some(result) = pages.next() else {
                break;
            };

            match result {
                Ok(page) => {
                    ctx.page_dispatched(&page);
                    let mut attempted = 0;
                    for asset in &page.items {
                        if ctx.cancel.is_cancelled() {
                            ctx.skip();
                            continue;
                        }
                        ctx.process(asset);
                        attempted += 1;
                    }
                    info!("Processed {} of {} assets on page", attempted, page.items.len());
                }
                Err(e) => {
                    ctx.listing_failed(&e);
                    listing_error = Some(e);
                }
            }
        }

        StrategyResult {
            listing_error,
            pagination_end: pages.end(),
            timed_out: false,
        }
    }
}

/// One paginator feeding a fixed pool of download workers.
///
/// The calling thread walks the catalog and pushes assets into a bounded
/// queue; `workers` scoped threads pull from it. The run is complete when
/// pagination has ended, the queue is closed and every worker has exited.
/// A listing failure ends pagination only: queued assets still download.
#[derive(Debug)]
pub struct PooledStrategy {
    /// Number of download workers.
    pub workers: usize,
    /// Capacity of the job queue.
    pub queue_capacity: usize,
    /// Soft stop: cancel outstanding work after this long.
    pub drain_timeout: Option<Duration>,
}

impl PooledStrategy {
    /// Create a pooled strategy (minimum one worker, queue capacity one).
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
            drain_timeout: None,
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }

    fn paginate<C, T>(
        &self,
        ctx: &SyncContext<'_, C, T>,
        start_token: Option<String>,
        jobs: &SyncSender<Asset>,
    ) -> StrategyResult
    where
        C: CatalogSource + ?Sized,
        T: AssetTransport,
    {
        let mut pages = CatalogPages::new(ctx.source, start_token);
        let mut listing_error = None;

        while !ctx.cancel.is_cancelled() {
            let Some(result) = pages.next() else {
                break;
            };

            match result {
                Ok(page) => {
                    ctx.page_dispatched(&page);
                    let mut workers_gone = false;
                    for asset in page.items {
                        if ctx.cancel.is_cancelled() {
                            ctx.skip();
                            continue;
                        }
                        if jobs.send(asset).is_err() {
                            workers_gone = true;
                            break;
                        }
                    }
                    if workers_gone {
                        error!("All download workers exited, stopping pagination");
                        break;
                    }
                }
                Err(e) => {
                    ctx.listing_failed(&e);
                    listing_error = Some(e);
                }
            }
        }

        StrategyResult {
            listing_error,
            pagination_end: pages.end(),
            timed_out: false,
        }
    }
}

impl Default for PooledStrategy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_WORKERS, crate::config::DEFAULT_WORKERS * 4)
    }
}

impl SyncStrategy for PooledStrategy {
    fn execute<C, T>(&self, ctx: &SyncContext<'_, C, T>, start_token: Option<String>) -> StrategyResult
    where
        C: CatalogSource + ?Sized,
        T: AssetTransport,
    {
        let (job_tx, job_rx) = mpsc::sync_channel::<Asset>(self.queue_capacity);
        // Owned by the workers only, so `send` fails once the last one exits.
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let timed_out = AtomicBool::new(false);

        let mut result = thread::scope(|scope| {
            if let Some(limit) = self.drain_timeout {
                let timed_out = &timed_out;
                scope.spawn(move || {
                    // Wakes early with `Disconnected` once the run finishes.
                    if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(limit) {
                        warn!(
                            timeout_secs = limit.as_secs(),
                            "Drain timeout reached, stopping outstanding downloads"
                        );
                        timed_out.store(true, Ordering::SeqCst);
                        ctx.cancel.cancel();
                    }
                });
            }

            let workers: Vec<_> = (0..self.workers)
                .map(|id| {
                    let job_rx = Arc::clone(&job_rx);
                    scope.spawn(move || worker_loop(id, &job_rx, ctx))
                })
                .collect();
            drop(job_rx);

            let result = self.paginate(ctx, start_token, &job_tx);

            // Closing the queue lets workers exit once it is drained.
            drop(job_tx);
            for worker in workers {
                if worker.join().is_err() {
                    error!("Download worker panicked");
                }
            }
            drop(done_tx);

            result
        });

        result.timed_out = timed_out.load(Ordering::SeqCst);
        result
    }
}

fn worker_loop<C, T>(id: usize, jobs: &Mutex<Receiver<Asset>>, ctx: &SyncContext<'_, C, T>)
where
    C: CatalogSource + ?Sized,
    T: AssetTransport,
{
    debug!(worker = id, "Download worker started");

    loop {
        let job = {
            let receiver = match jobs.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            receiver.recv()
        };

        let Ok(asset) = job else {
            break;
        };

        // Keep draining after cancellation so the paginator never blocks on a full queue.
        if ctx.cancel.is_cancelled() {
            ctx.skip();
            continue;
        }
        ctx.process(&asset);
    }

    debug!(worker = id, "Download worker finished");
}
