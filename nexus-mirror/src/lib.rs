//! nexus-mirror - mirror a Nexus 3 repository onto local disk
//!
//! This library enumerates every asset published by a repository through the
//! paginated assets REST endpoint and downloads each one beneath a local
//! mirror root, verifying its checksum on arrival.
//!
//! # Architecture
//!
//! ```text
//! SyncEngine ──► CatalogSource (page N) ──► download jobs ──► ItemDownloader
//!     ▲               │                                          │
//!     │               └── continuation token ──► page N+1        ▼
//!     └──────────── ProgressCounters ◄──────────── checksum verification
//! ```
//!
//! - [`catalog`] - listing API types, the HTTP client and the page iterator
//! - [`transport`] - content streams for asset download URLs
//! - [`mirror`] - mirror root validation, checksums and the item downloader
//! - [`sync`] - the sequential and pooled synchronization strategies
//! - [`config`] - run configuration and credentials loading

pub mod catalog;
pub mod config;
pub mod mirror;
pub mod sync;
pub mod transport;

/// Crate version, reported in the HTTP user agent and the CLI banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
