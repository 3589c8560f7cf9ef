//! Catalog listing: the assets REST endpoint and its pagination.
//!
//! - [`CatalogSource`] is the seam the engine pulls pages through
//! - [`CatalogClient`] implements it over HTTP
//! - [`CatalogPages`] walks continuation tokens until the listing ends

mod client;
mod error;
mod pages;
mod types;

use std::sync::Arc;

pub use client::{listing_url, CatalogClient, ASSETS_ENDPOINT};
pub use error::FetchError;
pub use pages::{CatalogPages, PaginationEnd};
pub use types::{Asset, AssetChecksum, CatalogPage};

/// Something that can list one page of the catalog.
pub trait CatalogSource: Send + Sync {
    /// Fetch the page identified by `continuation_token`; `None` is the first page.
    fn fetch_page(&self, continuation_token: Option<&str>) -> Result<CatalogPage, FetchError>;
}

impl<T: CatalogSource + ?Sized> CatalogSource for Arc<T> {
    fn fetch_page(&self, continuation_token: Option<&str>) -> Result<CatalogPage, FetchError> {
        (**self).fetch_page(continuation_token)
    }
}
