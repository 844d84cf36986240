//! Phased-Crawler: a bounded-parallelism breadth-first web crawler
//!
//! This crate implements a depth-limited crawler that downloads pages and
//! extracts their links through two independently sized worker pools, plus a
//! general-purpose parallel-map thread pool with chunked reductions on top.

pub mod concurrent;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawler construction and setup
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Crawler must be created inside a tokio runtime")]
    NoRuntime,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single page download
///
/// These are recorded in the crawl's error map and never abort a crawl.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: ::url::ParseError,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}")]
    Connect { url: String },

    #[error("Expected HTML from {url}, got {content_type}")]
    ContentMismatch { url: String, content_type: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Download cancelled: crawler is shut down")]
    Cancelled,

    #[error("Downloader panicked on {url}: {message}")]
    Panicked { url: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Failure to extract links from a downloaded page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTML parse error for {url}: {message}")]
    HtmlParse { url: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Parallel mapper errors
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Parallel mapper needs at least one worker")]
    NoWorkers,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Parallel mapper is closed")]
    Closed,

    #[error("Task {index} panicked: {message}")]
    TaskPanicked { index: usize, message: String },
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for parallel-map operations
pub type MapperResult<T> = std::result::Result<T, MapperError>;

// Re-export commonly used types
pub use concurrent::{IterativeParallelism, ParallelMapper};
pub use config::Config;
pub use crawler::{CrawlOutcome, Downloader, HttpDownloader, Page, WebCrawler};
