//! HTTP client construction and content streams for asset downloads.
//!
//! One [`reqwest::blocking::Client`] is built per run from [`HttpSettings`]
//! and shared by the catalog client and the download transport. Credentials
//! are attached per request; nothing here touches process-wide state.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use thiserror::Error;
use tracing::warn;

use crate::config::{Credentials, SyncConfig, DEFAULT_REQUEST_TIMEOUT};

/// Errors opening a content stream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Settings for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Timeout for each request, including reading the body.
    pub timeout: Duration,
    /// Skip certificate and host name validation.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            accept_invalid_certs: false,
            user_agent: format!("nexus-mirror/{}", crate::VERSION),
        }
    }
}

impl HttpSettings {
    /// Derive client settings from a run configuration.
    ///
    /// TLS repositories are reached without certificate validation, matching
    /// the behavior operators of self-signed Nexus instances rely on.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            timeout: config.request_timeout,
            accept_invalid_certs: config.is_secure(),
            ..Default::default()
        }
    }

    /// Build the client.
    pub fn build_client(&self) -> Result<Client, TransportError> {
        if self.accept_invalid_certs {
            warn!("TLS certificate and host name validation is disabled");
        }

        // rustls' permissive verifier accepts any certificate for any host name.
        Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))
    }
}

/// Attach Basic credentials to a request when configured.
pub(crate) fn authorize(
    request: RequestBuilder,
    credentials: Option<&Credentials>,
) -> RequestBuilder {
    match credentials {
        Some(c) => request.basic_auth(&c.username, Some(&c.password)),
        None => request,
    }
}

/// Source of asset content.
///
/// This abstraction lets the item downloader be exercised without a network.
pub trait AssetTransport: Send + Sync {
    /// Open a byte stream for the content at `url`.
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, TransportError>;
}

impl<T: AssetTransport + ?Sized> AssetTransport for Arc<T> {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
        (**self).open(url)
    }
}

/// Transport that performs a plain GET against the download URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: Client, credentials: Option<Credentials>, timeout: Duration) -> Self {
        Self {
            client,
            credentials,
            timeout,
        }
    }
}

impl AssetTransport for ReqwestTransport {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
        let request = authorize(self.client.get(url), self.credentials.as_ref());

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                TransportError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(Box::new(response))
    }
}
