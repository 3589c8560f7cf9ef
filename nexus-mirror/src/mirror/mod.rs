//! Local mirror: directory validation, checksums and per-asset downloads.
//!
//! ```text
//! ItemDownloader
//!     ├── MirrorRoot      (where the asset goes)
//!     ├── AssetTransport  (where the bytes come from)
//!     └── ExpectedDigest  (whether they are right)
//! ```

mod checksum;
mod downloader;
mod root;

pub use checksum::{sha1_file, sha256_file, ChecksumError, ExpectedDigest};
pub use downloader::{DownloadError, DownloadOutcome, ItemDownloader};
pub use root::{MirrorError, MirrorRoot};
