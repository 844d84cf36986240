//! The downloader seam injected into the crawler

use crate::{DownloadError, ExtractError};
use async_trait::async_trait;

/// A fetched page
///
/// Link extraction is CPU-bound; the crawler runs it on the blocking thread
/// pool, so implementations may parse synchronously.
pub trait Page: Send + Sync {
    /// Returns the outbound links of this page
    fn extract_links(&self) -> Result<Vec<String>, ExtractError>;
}

/// Fetches pages by URL
///
/// The crawler compares URLs by string equality and performs no
/// normalization of its own; implementations decide what a URL means.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads the page at `url`
    async fn download(&self, url: &str) -> Result<Box<dyn Page>, DownloadError>;
}
