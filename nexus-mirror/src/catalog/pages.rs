//! Iteration over catalog pages by continuation token.

use tracing::warn;

use super::error::FetchError;
use super::types::CatalogPage;
use super::CatalogSource;

/// Why pagination stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationEnd {
    /// The server returned a page without a continuation token.
    Exhausted,
    /// The server echoed back the token it was given.
    RepeatedToken,
    /// A listing request failed.
    Failed,
}

/// Iterator over the pages of a catalog.
///
/// Yields each page as it is fetched. Iteration ends after a page with no
/// continuation token, after a page whose token equals the one used to
/// request it (a server stuck on one page would otherwise loop forever), or
/// after the first error, which is yielded once.
pub struct CatalogPages<'a, C: CatalogSource + ?Sized> {
    source: &'a C,
    next_token: Option<String>,
    end: Option<PaginationEnd>,
}

impl<'a, C: CatalogSource + ?Sized> CatalogPages<'a, C> {
    /// Start paginating at `start_token` (`None` for the first page).
    pub fn new(source: &'a C, start_token: Option<String>) -> Self {
        Self {
            source,
            next_token: start_token,
            end: None,
        }
    }

    /// How pagination ended, once it has.
    pub fn end(&self) -> Option<PaginationEnd> {
        self.end
    }

    /// Token the next call to `next` will request with.
    pub fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }
}

impl<C: CatalogSource + ?Sized> Iterator for CatalogPages<'_, C> {
    type Item = Result<CatalogPage, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end.is_some() {
            return None;
        }

        let requested = self.next_token.take();
        let page = match self.source.fetch_page(requested.as_deref()) {
            Ok(page) => page,
            Err(e) => {
                self.end = Some(PaginationEnd::Failed);
                return Some(Err(e));
            }
        };

        match &page.continuation_token {
            None => self.end = Some(PaginationEnd::Exhausted),
            Some(token) if requested.as_deref() == Some(token.as_str()) => {
                warn!(token = %token, "Server repeated continuation token, stopping pagination");
                self.end = Some(PaginationEnd::RepeatedToken);
            }
            Some(token) => self.next_token = Some(token.clone()),
        }

        Some(Ok(page))
    }
}
