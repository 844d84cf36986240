//! Per-crawl shared state
//!
//! A [`CrawlRun`] lives for exactly one `download` call. Download workers
//! record failures into it and extraction workers add harvested links; the
//! controller drains both between depths. The finished result is a
//! [`CrawlOutcome`].

use crate::DownloadError;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Shared, worker-written state of one crawl
#[derive(Debug, Default)]
pub struct CrawlRun {
    errors: Mutex<HashMap<String, DownloadError>>,
    harvested: Mutex<Vec<String>>,
}

impl CrawlRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a download failure; the first failure for a URL wins
    pub fn record_error(&self, url: String, error: DownloadError) {
        self.errors.lock().entry(url).or_insert(error);
    }

    /// Adds links harvested from one page to the next depth's candidates
    pub fn harvest(&self, links: Vec<String>) {
        if links.is_empty() {
            return;
        }
        self.harvested.lock().extend(links);
    }

    /// Takes every link harvested since the last call
    pub fn take_harvest(&self) -> Vec<String> {
        std::mem::take(&mut *self.harvested.lock())
    }

    /// Returns true if a failure was recorded for `url`
    #[cfg(test)]
    pub(crate) fn has_error(&self, url: &str) -> bool {
        self.errors.lock().contains_key(url)
    }

    /// Takes the error map, leaving it empty
    pub fn take_errors(&self) -> HashMap<String, DownloadError> {
        std::mem::take(&mut *self.errors.lock())
    }
}

/// Result of a crawl: successfully downloaded URLs and per-URL failures
///
/// A URL never appears in both. The order of `downloaded` is unspecified.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub downloaded: Vec<String>,
    pub errors: HashMap<String, DownloadError>,
}

impl CrawlOutcome {
    /// Returns true if no download failed
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of URLs that were dispatched, successful or not
    pub fn total(&self) -> usize {
        self.downloaded.len() + self.errors.len()
    }

    /// Downloaded URLs in lexicographic order
    pub fn sorted_downloaded(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.downloaded.iter().map(String::as_str).collect();
        urls.sort_unstable();
        urls
    }

    /// Errors ordered by URL
    pub fn sorted_errors(&self) -> Vec<(&str, &DownloadError)> {
        let mut errors: Vec<_> = self
            .errors
            .iter()
            .map(|(url, error)| (url.as_str(), error))
            .collect();
        errors.sort_unstable_by(|a, b| a.0.cmp(b.0));
        errors
    }
}
