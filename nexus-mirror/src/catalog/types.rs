//! Wire types for the assets listing endpoint.

use serde::Deserialize;

/// Checksums declared by the server for one asset.
///
/// Only `sha1` is authoritative; `sha256` is consulted when a server omits
/// `sha1`. Other digests the server may send are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssetChecksum {
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
}

/// One downloadable item from the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Absolute URL of the content blob.
    pub download_url: String,
    /// Location relative to the mirror root, may contain nested directories.
    pub path: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub checksum: AssetChecksum,
}

impl Asset {
    /// Create an asset with a SHA-1 checksum and empty pass-through metadata.
    pub fn new(
        download_url: impl Into<String>,
        path: impl Into<String>,
        sha1: impl Into<String>,
    ) -> Self {
        Self {
            download_url: download_url.into(),
            path: path.into(),
            id: String::new(),
            repository: String::new(),
            format: String::new(),
            checksum: AssetChecksum {
                sha1: Some(sha1.into()),
                ..Default::default()
            },
        }
    }
}

/// One page of the listing, as returned by a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    #[serde(default)]
    pub items: Vec<Asset>,
    /// Token for the next page; `None` on the final page.
    #[serde(default)]
    pub continuation_token: Option<String>,
}

impl CatalogPage {
    pub fn new(items: Vec<Asset>, continuation_token: Option<String>) -> Self {
        Self {
            items,
            continuation_token,
        }
    }

    /// Whether this page is the last one of the listing.
    pub fn is_last(&self) -> bool {
        self.continuation_token.is_none()
    }
}
