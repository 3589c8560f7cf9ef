//! Catalog listing errors.

use thiserror::Error;

/// A listing request failed. Never retried.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("invalid repository URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to list assets from {url}: {reason}")]
    Request { url: String, reason: String },

    #[error("listing {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode asset listing from {url}: {reason}")]
    Decode { url: String, reason: String },
}
