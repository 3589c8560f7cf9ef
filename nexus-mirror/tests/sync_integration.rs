//! Integration tests for repository synchronization.
//!
//! These tests drive the public engine API end to end against an in-memory
//! catalog and an in-memory blob store:
//! - continuation-token pagination and its stop conditions
//! - pooled and single-threaded scheduling
//! - checksum retry and exhaustion
//! - idempotent re-runs, drain timeout and cancellation
//!
//! Run with: `cargo test --test sync_integration`

use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use sha1::{Digest, Sha1};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use nexus_mirror::catalog::{Asset, CatalogPage, CatalogSource, FetchError, PaginationEnd};
use nexus_mirror::config::SyncConfig;
use nexus_mirror::mirror::MirrorRoot;
use nexus_mirror::sync::{ProgressSnapshot, SyncEngine, SyncReport};
use nexus_mirror::transport::{AssetTransport, TransportError};

// ============================================================================
// Fakes
// ============================================================================

/// Catalog serving fixed responses keyed by the requested token.
#[derive(Default)]
struct FakeCatalog {
    pages: HashMap<Option<String>, Result<CatalogPage, FetchError>>,
    latency: Duration,
    requests: AtomicUsize,
}

impl FakeCatalog {
    /// Delay every listing response by `latency`.
    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn page(mut self, token: Option<&str>, items: Vec<Asset>, next: Option<&str>) -> Self {
        self.pages.insert(
            token.map(String::from),
            Ok(CatalogPage::new(items, next.map(String::from))),
        );
        self
    }

    fn failing(mut self, token: Option<&str>, status: u16) -> Self {
        self.pages.insert(
            token.map(String::from),
            Err(FetchError::Status {
                url: format!("http://nexus.test/service/rest/v1/assets?continuationToken={:?}", token),
                status,
            }),
        );
        self
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl CatalogSource for FakeCatalog {
    fn fetch_page(&self, token: Option<&str>) -> Result<CatalogPage, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        self.pages
            .get(&token.map(String::from))
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::Status {
                    url: "http://nexus.test/unknown".to_string(),
                    status: 404,
                })
            })
    }
}

/// Blob store that can serve corrupted content for the first few opens.
#[derive(Default)]
struct FakeBlobs {
    blobs: HashMap<String, Vec<u8>>,
    corrupt_opens: HashMap<String, usize>,
    opens: Mutex<HashMap<String, usize>>,
}

impl FakeBlobs {
    fn blob(mut self, url: &str, content: &[u8]) -> Self {
        self.blobs.insert(url.to_string(), content.to_vec());
        self
    }

    fn corrupt_first(mut self, url: &str, opens: usize) -> Self {
        self.corrupt_opens.insert(url.to_string(), opens);
        self
    }

    fn opens(&self, url: &str) -> usize {
        self.opens.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl AssetTransport for FakeBlobs {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
        let count = {
            let mut opens = self.opens.lock().unwrap();
            let count = opens.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let Some(content) = self.blobs.get(url) else {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            });
        };

        let corrupt = self.corrupt_opens.get(url).copied().unwrap_or(0);
        if count <= corrupt {
            return Ok(Box::new(Cursor::new(b"corrupted".to_vec())));
        }
        Ok(Box::new(Cursor::new(content.clone())))
    }
}

/// Transport whose streams trickle out one byte every few milliseconds.
struct SlowBlobs;

struct SlowReader {
    remaining: usize,
}

impl Read for SlowReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        thread::sleep(Duration::from_millis(5));
        buf[0] = b'x';
        self.remaining -= 1;
        Ok(1)
    }
}

impl AssetTransport for SlowBlobs {
    fn open(&self, _url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
        Ok(Box::new(SlowReader { remaining: 100_000 }))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn sha1_hex(data: &[u8]) -> String {
    Sha1::digest(data)
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

fn url(path: &str) -> String {
    format!("http://nexus.test/repository/releases/{}", path)
}

/// An asset whose declared checksum matches `content`.
fn asset(path: &str, content: &[u8]) -> Asset {
    Asset::new(url(path), path, sha1_hex(content))
}

fn content(path: &str) -> Vec<u8> {
    format!("content of {}", path).into_bytes()
}

/// Catalog plus blobs for a page layout; page `i` is requested with token `T{i}`.
fn repository(layout: &[usize]) -> (FakeCatalog, FakeBlobs) {
    let mut catalog = FakeCatalog::default();
    let mut blobs = FakeBlobs::default();

    for (page, &size) in layout.iter().enumerate() {
        let items: Vec<Asset> = (0..size)
            .map(|i| {
                let path = format!("p{}/a{}.jar", page, i);
                let body = content(&path);
                let item = asset(&path, &body);
                blobs.blobs.insert(url(&path), body);
                item
            })
            .collect();

        let token = (page > 0).then(|| format!("T{}", page));
        let next = (page + 1 < layout.len()).then(|| format!("T{}", page + 1));
        catalog = catalog.page(token.as_deref(), items, next.as_deref());
    }

    (catalog, blobs)
}

fn pooled(workers: usize) -> SyncConfig {
    SyncConfig::new("http://nexus.test", "releases").with_workers(workers)
}

fn single() -> SyncConfig {
    SyncConfig::new("http://nexus.test", "releases").single()
}

fn run<C, T>(catalog: C, blobs: T, root: &Path, config: &SyncConfig) -> SyncReport
where
    C: CatalogSource,
    T: AssetTransport,
{
    SyncEngine::new(catalog, blobs, MirrorRoot::unchecked(root), config).run(None)
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

// ============================================================================
// Pagination
// ============================================================================

/// Two pages: [a, b] then [c]; the listing ends on the page without a token.
#[test]
fn test_two_page_catalog_is_fully_mirrored() {
    let (a, b, c) = (b"alpha".as_slice(), b"bravo".as_slice(), b"charlie".as_slice());

    for config in [pooled(10), single()] {
        let temp = TempDir::new().unwrap();
        let catalog = Arc::new(
            FakeCatalog::default()
                .page(None, vec![asset("a", a), asset("b", b)], Some("T1"))
                .page(Some("T1"), vec![asset("c", c)], None),
        );
        let blobs = FakeBlobs::default()
            .blob(&url("a"), a)
            .blob(&url("b"), b)
            .blob(&url("c"), c);

        let report = run(Arc::clone(&catalog), blobs, temp.path(), &config);

        assert_eq!(report.progress.found, 3);
        assert_eq!(report.progress.processed, 3);
        assert_eq!(report.progress.downloaded, 3);
        assert_eq!(report.progress.pages, 2);
        assert_eq!(report.pagination_end, Some(PaginationEnd::Exhausted));
        assert!(report.is_complete(), "{:?}", report);
        assert_eq!(catalog.requests(), 2);

        assert_eq!(fs::read(temp.path().join("a")).unwrap(), a);
        assert_eq!(fs::read(temp.path().join("b")).unwrap(), b);
        assert_eq!(fs::read(temp.path().join("c")).unwrap(), c);
    }
}

/// A server that echoes the requested token must not loop forever.
#[test]
fn test_repeated_token_stops_pagination() {
    for config in [pooled(4), single()] {
        let temp = TempDir::new().unwrap();
        let catalog = Arc::new(
            FakeCatalog::default()
                .page(None, vec![asset("a", b"alpha")], Some("T1"))
                .page(Some("T1"), vec![asset("b", b"bravo")], Some("T1")),
        );
        let blobs = FakeBlobs::default()
            .blob(&url("a"), b"alpha")
            .blob(&url("b"), b"bravo");

        let report = run(Arc::clone(&catalog), blobs, temp.path(), &config);

        assert_eq!(catalog.requests(), 2);
        assert_eq!(report.pagination_end, Some(PaginationEnd::RepeatedToken));
        assert_eq!(report.progress.found, 2);
        assert_eq!(report.progress.processed, 2);
        assert!(report.is_complete());
    }
}

/// Resuming from a continuation token skips the pages before it.
#[test]
fn test_resume_from_continuation_token() {
    let temp = TempDir::new().unwrap();
    let (catalog, blobs) = repository(&[2, 3, 1]);

    let engine = SyncEngine::new(catalog, blobs, MirrorRoot::unchecked(temp.path()), &single());
    let report = engine.run(Some("T1".to_string()));

    assert_eq!(report.progress.pages, 2);
    assert_eq!(report.progress.found, 4);
    assert!(!temp.path().join("p0").exists());
    assert!(temp.path().join("p1/a2.jar").exists());
    assert!(temp.path().join("p2/a0.jar").exists());
}

/// An empty first page without a token is an empty, complete run.
#[test]
fn test_empty_repository() {
    for config in [pooled(3), single()] {
        let temp = TempDir::new().unwrap();
        let catalog = FakeCatalog::default().page(None, Vec::new(), None);

        let report = run(catalog, FakeBlobs::default(), temp.path(), &config);

        assert_eq!(report.progress.found, 0);
        assert_eq!(report.progress.processed, 0);
        assert!(report.is_complete());
        assert_eq!(count_files(temp.path()), 0);
    }
}

// ============================================================================
// Listing failures
// ============================================================================

/// A failing page ends the listing; assets already discovered still land.
#[test]
fn test_listing_error_mid_run() {
    for config in [pooled(2), single()] {
        let temp = TempDir::new().unwrap();
        let catalog = FakeCatalog::default()
            .page(None, vec![asset("a", b"alpha"), asset("b", b"bravo")], Some("T1"))
            .failing(Some("T1"), 401);
        let blobs = FakeBlobs::default()
            .blob(&url("a"), b"alpha")
            .blob(&url("b"), b"bravo");

        let report = run(catalog, blobs, temp.path(), &config);

        assert_eq!(report.progress.found, 2);
        assert_eq!(report.progress.processed, 2);
        assert_eq!(report.pagination_end, Some(PaginationEnd::Failed));
        assert!(report.listing_error.as_deref().unwrap().contains("401"));
        assert!(!report.is_complete());
        assert!(temp.path().join("a").exists());
        assert!(temp.path().join("b").exists());
    }
}

/// A failing first page downloads nothing.
#[test]
fn test_listing_error_on_first_page() {
    let temp = TempDir::new().unwrap();
    let catalog = FakeCatalog::default().failing(None, 500);

    let report = run(catalog, FakeBlobs::default(), temp.path(), &pooled(4));

    assert_eq!(report.progress.found, 0);
    assert!(report.listing_error.is_some());
    assert!(!report.is_complete());
    assert_eq!(count_files(temp.path()), 0);
}

/// Pooled mode keeps going while listing responses are slow.
#[test]
fn test_pooled_run_waits_for_slow_pages() {
    let temp = TempDir::new().unwrap();
    let (catalog, blobs) = repository(&[3, 3, 3, 3]);
    let catalog = Arc::new(catalog.with_latency(Duration::from_millis(25)));

    let report = run(Arc::clone(&catalog), blobs, temp.path(), &pooled(4));

    assert_eq!(catalog.requests(), 4);
    assert_eq!(report.progress.pages, 4);
    assert_eq!(report.progress.found, 12);
    assert_eq!(report.progress.processed, 12);
    assert!(report.is_complete());
    assert_eq!(count_files(temp.path()), 12);
}

// ============================================================================
// Checksums
// ============================================================================

/// Two corrupted transfers followed by a good one still succeed.
#[test]
fn test_checksum_retry_then_success() {
    let temp = TempDir::new().unwrap();
    let body = b"the real bytes";
    let catalog = FakeCatalog::default().page(None, vec![asset("lib/x.jar", body)], None);
    let blobs = Arc::new(
        FakeBlobs::default()
            .blob(&url("lib/x.jar"), body)
            .corrupt_first(&url("lib/x.jar"), 2),
    );

    let report = run(catalog, Arc::clone(&blobs), temp.path(), &single());

    assert_eq!(blobs.opens(&url("lib/x.jar")), 3);
    assert_eq!(report.progress.processed, 1);
    assert_eq!(report.progress.downloaded, 1);
    assert_eq!(report.progress.checksum_mismatches, 0);
    assert!(report.is_complete());
    assert_eq!(fs::read(temp.path().join("lib/x.jar")).unwrap(), body);
}

/// Content that never matches is given up on after three attempts.
#[test]
fn test_checksum_exhaustion() {
    let temp = TempDir::new().unwrap();
    let catalog = FakeCatalog::default().page(None, vec![asset("x.jar", b"expected")], None);
    let blobs = Arc::new(
        FakeBlobs::default()
            .blob(&url("x.jar"), b"expected")
            .corrupt_first(&url("x.jar"), usize::MAX),
    );

    let report = run(catalog, Arc::clone(&blobs), temp.path(), &pooled(2));

    assert_eq!(blobs.opens(&url("x.jar")), 3);
    assert_eq!(report.progress.processed, 1);
    assert_eq!(report.progress.checksum_mismatches, 1);
    assert!(report.has_failures());
    assert!(!report.is_complete());
}

/// A missing blob is an I/O failure for that asset only.
#[test]
fn test_missing_blob_does_not_abort_run() {
    let temp = TempDir::new().unwrap();
    let catalog = FakeCatalog::default().page(
        None,
        vec![asset("gone", b"gone"), asset("here", b"here")],
        None,
    );
    let blobs = FakeBlobs::default().blob(&url("here"), b"here");

    let report = run(catalog, blobs, temp.path(), &single());

    assert_eq!(report.progress.processed, 2);
    assert_eq!(report.progress.io_failures, 1);
    assert_eq!(report.progress.downloaded, 1);
    assert!(!temp.path().join("gone").exists());
    assert!(temp.path().join("here").exists());
}

// ============================================================================
// Idempotence and layout
// ============================================================================

/// A second run over an unchanged mirror downloads nothing.
#[test]
fn test_rerun_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let (catalog, blobs) = repository(&[3, 2]);
    let catalog = Arc::new(catalog);
    let blobs = Arc::new(blobs);

    let first = run(Arc::clone(&catalog), Arc::clone(&blobs), temp.path(), &pooled(4));
    assert_eq!(first.progress.downloaded, 5);
    let before = fs::read(temp.path().join("p1/a1.jar")).unwrap();

    let second = run(Arc::clone(&catalog), Arc::clone(&blobs), temp.path(), &pooled(4));
    assert_eq!(second.progress.found, 5);
    assert_eq!(second.progress.already_present, 5);
    assert_eq!(second.progress.downloaded, 0);
    assert_eq!(second.progress.io_failures, 0);
    assert!(second.is_complete());
    assert_eq!(fs::read(temp.path().join("p1/a1.jar")).unwrap(), before);
    assert_eq!(blobs.opens(&url("p1/a1.jar")), 1);
}

/// Asset paths map onto nested directories below the mirror root.
#[test]
fn test_nested_paths_resolved_under_root() {
    let temp = TempDir::new().unwrap();
    let body = b"<project/>";
    let catalog = FakeCatalog::default().page(
        None,
        vec![asset("/org/example/lib/1.0/lib-1.0.pom", body)],
        None,
    );
    let blobs = FakeBlobs::default().blob(&url("/org/example/lib/1.0/lib-1.0.pom"), body);

    let report = run(catalog, blobs, temp.path(), &single());

    assert!(report.is_complete());
    assert_eq!(
        fs::read(temp.path().join("org/example/lib/1.0/lib-1.0.pom")).unwrap(),
        body
    );
}

/// A directory occupying an asset's path is a failure, not a skipped file.
#[test]
fn test_directory_in_place_of_asset_is_failure() {
    let temp = TempDir::new().unwrap();
    let catalog = FakeCatalog::default().page(
        None,
        vec![asset("a/b", b"nested"), asset("a", b"shadowed")],
        None,
    );
    let blobs = FakeBlobs::default()
        .blob(&url("a/b"), b"nested")
        .blob(&url("a"), b"shadowed");

    let report = run(catalog, blobs, temp.path(), &single());

    assert_eq!(report.progress.downloaded, 1);
    assert_eq!(report.progress.already_present, 0);
    assert_eq!(report.progress.io_failures, 1);
    assert!(!report.is_complete());
    assert!(temp.path().join("a").is_dir());
}

/// Paths escaping the mirror root are refused and counted as failures.
#[test]
fn test_escaping_path_is_refused() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("mirror");
    fs::create_dir(&root).unwrap();
    let catalog = FakeCatalog::default().page(None, vec![asset("../evil", b"evil")], None);
    let blobs = FakeBlobs::default().blob(&url("../evil"), b"evil");

    let report = run(catalog, blobs, &root, &single());

    assert_eq!(report.progress.io_failures, 1);
    assert!(!temp.path().join("evil").exists());
}

// ============================================================================
// Stopping early
// ============================================================================

/// The drain timeout stops outstanding downloads and removes partial files.
#[test]
fn test_drain_timeout_stops_pooled_run() {
    let temp = TempDir::new().unwrap();
    let items: Vec<Asset> = (0..6)
        .map(|i| Asset::new(url(&format!("slow{}", i)), format!("slow{}", i), "0".repeat(40)))
        .collect();
    let catalog = FakeCatalog::default().page(None, items, None);
    let config = pooled(2).with_drain_timeout(Some(Duration::from_millis(200)));

    let started = Instant::now();
    let report = run(catalog, SlowBlobs, temp.path(), &config);

    assert!(started.elapsed() < Duration::from_secs(30));
    assert!(report.timed_out);
    assert!(!report.cancelled);
    assert!(!report.is_complete());
    assert_eq!(report.progress.found, 6);
    assert_eq!(report.progress.processed, 6);
    assert_eq!(report.progress.cancelled, 6);
    assert_eq!(report.progress.downloaded, 0);
    assert_eq!(count_files(temp.path()), 0);
}

/// Cancelling the engine's token stops a single-threaded run.
#[test]
fn test_cancellation_stops_single_run() {
    let temp = TempDir::new().unwrap();
    let items: Vec<Asset> = (0..3)
        .map(|i| Asset::new(url(&format!("slow{}", i)), format!("slow{}", i), "0".repeat(40)))
        .collect();
    let catalog = FakeCatalog::default().page(None, items, None);
    let token = CancellationToken::new();

    let engine = SyncEngine::new(catalog, SlowBlobs, MirrorRoot::unchecked(temp.path()), &single())
        .with_cancellation(token.clone());

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        token.cancel();
    });

    let report = engine.run(None);
    canceller.join().unwrap();

    assert!(report.cancelled);
    assert!(!report.is_complete());
    assert_eq!(report.progress.processed, 3);
    assert_eq!(report.progress.cancelled, 3);
    assert_eq!(report.progress.downloaded, 0);
    assert_eq!(count_files(temp.path()), 0);
}

/// A worker that dies ends the run instead of blocking the paginator forever.
#[test]
fn test_panicking_progress_callback_does_not_hang_pooled_run() {
    let temp = TempDir::new().unwrap();
    let (catalog, blobs) = repository(&[20]);
    let config = pooled(1).with_queue_capacity(1);

    let engine = SyncEngine::new(catalog, blobs, MirrorRoot::unchecked(temp.path()), &config)
        .with_progress(Arc::new(|snapshot: ProgressSnapshot| {
            if snapshot.processed >= 1 {
                panic!("progress observer failed");
            }
        }));

    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = done_tx.send(engine.run(None));
    });

    let report = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("sync run did not return after its only worker died");

    assert_eq!(report.progress.found, 20);
    assert!(report.progress.processed < report.progress.found);
    assert!(!report.is_complete());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every discovered asset is processed exactly once, whatever the page
    /// layout and scheduling.
    #[test]
    fn prop_processed_equals_found(
        layout in prop::collection::vec(0usize..6, 1..5),
        workers in 1usize..6,
        use_single in any::<bool>(),
        latency_ms in 0u64..4,
    ) {
        let temp = TempDir::new().unwrap();
        let (catalog, blobs) = repository(&layout);
        let catalog = catalog.with_latency(Duration::from_millis(latency_ms));
        let config = if use_single { single() } else { pooled(workers) };
        let total: usize = layout.iter().sum();

        let report = run(catalog, blobs, temp.path(), &config);

        prop_assert_eq!(report.progress.found, total as u64);
        prop_assert_eq!(report.progress.processed, total as u64);
        prop_assert_eq!(report.progress.downloaded, total as u64);
        prop_assert_eq!(report.progress.pages, layout.len() as u64);
        prop_assert!(report.is_complete());
        prop_assert_eq!(count_files(temp.path()), total);
    }
}
