//! HTTP implementation of [`CatalogSource`].

use reqwest::blocking::Client;
use reqwest::Url;
use tracing::debug;

use super::error::FetchError;
use super::types::CatalogPage;
use super::CatalogSource;
use crate::config::Credentials;
use crate::transport::authorize;

/// Path segments of the assets listing endpoint, relative to the base URL.
pub const ASSETS_ENDPOINT: [&str; 4] = ["service", "rest", "v1", "assets"];

/// Build the listing URL for one page.
///
/// The continuation token is only added when present; its absence requests
/// the first page.
pub fn listing_url(
    base_url: &str,
    repository: &str,
    continuation_token: Option<&str>,
) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("URL cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(ASSETS_ENDPOINT);

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("repository", repository);
        if let Some(token) = continuation_token {
            query.append_pair("continuationToken", token);
        }
    }

    Ok(url)
}

/// Lists assets of one repository over HTTP.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    repository: String,
    credentials: Option<Credentials>,
}

impl CatalogClient {
    /// Create a client, validating the base URL up front.
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        repository: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Result<Self, FetchError> {
        let base_url = base_url.into();
        let repository = repository.into();
        listing_url(&base_url, &repository, None)?;

        Ok(Self {
            client,
            base_url,
            repository,
            credentials,
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }
}

impl CatalogSource for CatalogClient {
    fn fetch_page(&self, continuation_token: Option<&str>) -> Result<CatalogPage, FetchError> {
        let url = listing_url(&self.base_url, &self.repository, continuation_token)?;
        debug!(url = %url, "Listing assets");

        let request = authorize(self.client.get(url.clone()), self.credentials.as_ref());
        let response = request.send().map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: format!("failed to read response: {}", e),
        })?;

        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
