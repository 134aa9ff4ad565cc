//! Fetch port.

use async_trait::async_trait;
use url::Url;

use crate::error::FetchResult;
use crate::types::FetchedPage;

/// Fetches a single page with whatever bounds the implementation enforces.
///
/// The production implementation is [`crate::fetcher::MetadataFetcher`];
/// tests substitute a canned fetcher.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> FetchResult<FetchedPage>;
}
