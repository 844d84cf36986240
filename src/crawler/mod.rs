//! Crawler module for breadth-first page traversal
//!
//! This module contains the core crawling logic, including:
//! - The traversal controller and its per-depth loop
//! - The download and link-extraction worker pools
//! - The completion barrier that separates depths
//! - Per-host download limiting
//! - The default HTTP downloader and HTML link extraction

mod coordinator;
mod download;
mod downloader;
mod extract;
mod fetcher;
mod host_limit;
mod parser;
mod phaser;
mod pool;

pub use coordinator::{CrawlerOptions, WebCrawler};
pub use downloader::{Downloader, Page};
pub use fetcher::{build_http_client, HttpDownloader};
pub use host_limit::{HostLimiter, HostPermit};
pub use parser::{extract_links, HtmlPage};
pub use phaser::{PhaseTicket, Phaser};

pub use crate::state::CrawlOutcome;

use crate::config::Config;
use crate::CrawlError;
use std::sync::Arc;

/// Runs a complete crawl with the default HTTP downloader
///
/// This is the main entry point used by the binary. It will:
/// 1. Build the HTTP client
/// 2. Start the download and extraction pools
/// 3. Crawl from `seed` to the configured depth
/// 4. Shut the pools down
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - Crawl finished; per-URL failures are inside
/// * `Err(CrawlError)` - The crawler could not be initialized
pub async fn crawl(config: &Config, seed: &str) -> Result<CrawlOutcome, CrawlError> {
    let downloader = HttpDownloader::new(&config.user_agent, &config.http)?;
    let crawler = WebCrawler::with_options(
        Arc::new(downloader),
        CrawlerOptions::from(&config.crawler),
    )?;

    let outcome = crawler.download(seed, config.crawler.depth).await;
    crawler.close().await;

    Ok(outcome)
}
