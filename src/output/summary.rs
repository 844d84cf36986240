//! Crawl summary data shared by the output formats

use crate::state::CrawlOutcome;
use crate::url::host_of;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Everything the reports print about one finished crawl
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Seed URL the crawl started from
    pub seed: String,

    /// Maximum depth requested
    pub depth: usize,

    /// Wall-clock time of the crawl
    pub elapsed: Duration,

    /// Hash of the configuration file, if one was loaded
    pub config_hash: Option<String>,

    /// Downloaded URLs in lexicographic order
    pub downloaded: Vec<String>,

    /// `(url, message)` for every failed download, ordered by URL
    pub errors: Vec<(String, String)>,

    /// Distinct hosts among all dispatched URLs
    pub unique_hosts: usize,
}

impl CrawlSummary {
    /// Builds a summary from a crawl outcome
    pub fn new(seed: &str, depth: usize, elapsed: Duration, outcome: &CrawlOutcome) -> Self {
        let downloaded: Vec<String> = outcome
            .sorted_downloaded()
            .into_iter()
            .map(str::to_string)
            .collect();

        let errors: Vec<(String, String)> = outcome
            .sorted_errors()
            .into_iter()
            .map(|(url, error)| (url.to_string(), error.to_string()))
            .collect();

        let unique_hosts = downloaded
            .iter()
            .chain(errors.iter().map(|(url, _)| url))
            .filter_map(|url| host_of(url))
            .collect::<BTreeSet<_>>()
            .len();

        Self {
            seed: seed.to_string(),
            depth,
            elapsed,
            config_hash: None,
            downloaded,
            errors,
            unique_hosts,
        }
    }

    /// Attaches the configuration hash
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Number of dispatched URLs
    pub fn total(&self) -> usize {
        self.downloaded.len() + self.errors.len()
    }

    /// Percentage of dispatched URLs that downloaded successfully
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            (self.downloaded.len() as f64 / self.total() as f64) * 100.0
        }
    }

    /// Percentage of dispatched URLs that failed
    pub fn error_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            (self.errors.len() as f64 / self.total() as f64) * 100.0
        }
    }
}
