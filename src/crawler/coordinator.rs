//! Crawler coordinator - breadth-first traversal over two worker pools
//!
//! This module owns the crawl loop:
//! - Seeding the frontier and tracking discovered URLs
//! - Dispatching one depth at a time to the download pool
//! - Waiting on the completion barrier for the depth to drain
//! - Admitting harvested links into the next frontier
//! - Shutting both pools down on close

use crate::config::CrawlerConfig;
use crate::crawler::download::{run_download, DownloadContext, DownloadJob};
use crate::crawler::downloader::Downloader;
use crate::crawler::extract::{run_extraction, ExtractJob};
use crate::crawler::host_limit::HostLimiter;
use crate::crawler::phaser::Phaser;
use crate::crawler::pool::WorkerPool;
use crate::state::{CrawlOutcome, CrawlRun};
use crate::CrawlError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Sizing and shutdown options for a [`WebCrawler`]
#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    /// Number of concurrent download workers
    pub download_workers: usize,

    /// Number of concurrent link-extraction workers
    pub extract_workers: usize,

    /// Maximum concurrent downloads per host (0 = unlimited)
    pub per_host_limit: usize,

    /// Capacity of each pool's job queue
    pub queue_capacity: usize,

    /// How long `close` waits for workers before aborting them
    pub shutdown_timeout: Duration,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for CrawlerOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            download_workers: config.download_workers,
            extract_workers: config.extract_workers,
            per_host_limit: config.per_host_limit,
            queue_capacity: config.queue_capacity,
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }
}

/// Depth-limited breadth-first crawler
///
/// Downloads and link extractions run in two separate fixed-size pools,
/// each sized for its own bottleneck. A crawler is reusable: any number of
/// `download` calls, even concurrent ones, may run before `close`.
pub struct WebCrawler {
    downloads: Arc<WorkerPool<DownloadJob>>,
    extractions: Arc<WorkerPool<ExtractJob>>,
    shutdown: watch::Sender<bool>,
    shutdown_timeout: Duration,
    closed: AtomicBool,
}

impl WebCrawler {
    /// Creates a crawler with default queue capacity and shutdown timeout
    ///
    /// # Arguments
    ///
    /// * `downloader` - Fetches pages; shared by all download workers
    /// * `download_workers` - Size of the download pool (>= 1)
    /// * `extract_workers` - Size of the extraction pool (>= 1)
    /// * `per_host_limit` - Concurrent downloads allowed per host, 0 for no limit
    ///
    /// # Returns
    ///
    /// * `Ok(WebCrawler)` - Pools are running
    /// * `Err(CrawlError)` - Invalid sizing, or no tokio runtime is active
    pub fn new(
        downloader: Arc<dyn Downloader>,
        download_workers: usize,
        extract_workers: usize,
        per_host_limit: usize,
    ) -> Result<Self, CrawlError> {
        Self::with_options(
            downloader,
            CrawlerOptions {
                download_workers,
                extract_workers,
                per_host_limit,
                ..CrawlerOptions::default()
            },
        )
    }

    /// Creates a crawler from explicit options
    pub fn with_options(
        downloader: Arc<dyn Downloader>,
        options: CrawlerOptions,
    ) -> Result<Self, CrawlError> {
        if options.download_workers == 0 {
            return Err(CrawlError::InvalidArgument(
                "download_workers must be >= 1".to_string(),
            ));
        }
        if options.extract_workers == 0 {
            return Err(CrawlError::InvalidArgument(
                "extract_workers must be >= 1".to_string(),
            ));
        }
        if options.queue_capacity == 0 {
            return Err(CrawlError::InvalidArgument(
                "queue_capacity must be >= 1".to_string(),
            ));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CrawlError::NoRuntime);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);

        let extractions = Arc::new(WorkerPool::spawn(
            "extract",
            options.extract_workers,
            options.queue_capacity,
            shutdown_rx.clone(),
            run_extraction,
        ));

        let context = Arc::new(DownloadContext {
            downloader,
            hosts: HostLimiter::new(options.per_host_limit),
            extractions: Arc::clone(&extractions),
        });

        let downloads = Arc::new(WorkerPool::spawn(
            "download",
            options.download_workers,
            options.queue_capacity,
            shutdown_rx,
            move |job| run_download(Arc::clone(&context), job),
        ));

        tracing::debug!(
            "Crawler started: {} download workers, {} extract workers, per-host limit {}",
            options.download_workers,
            options.extract_workers,
            options.per_host_limit
        );

        Ok(Self {
            downloads,
            extractions,
            shutdown,
            shutdown_timeout: options.shutdown_timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Crawls breadth-first from `seed` down to `max_depth` levels
    ///
    /// The seed is depth 0. Pages at depth `max_depth - 1` are downloaded but
    /// their links are never harvested. `max_depth == 0` downloads nothing.
    ///
    /// Every URL is dispatched at most once per call. When this returns, all
    /// work spawned for the call has finished.
    pub async fn download(&self, seed: &str, max_depth: usize) -> CrawlOutcome {
        if max_depth == 0 {
            return CrawlOutcome::default();
        }

        let run = Arc::new(CrawlRun::new());
        let phaser = Phaser::new();

        let mut discovered: HashSet<String> = HashSet::from([seed.to_string()]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier = vec![seed.to_string()];
        let mut depth = 0;

        while depth < max_depth && !frontier.is_empty() {
            tracing::info!("Depth {}: dispatching {} URLs", depth, frontier.len());

            for url in frontier.drain(..) {
                // Provisionally visited; failures are removed after the last depth
                visited.insert(url.clone());

                let job = DownloadJob::new(url, depth, max_depth, Arc::clone(&run), phaser.register());
                if let Err(job) = self.downloads.submit(job).await {
                    tracing::debug!("Download pool is closed; skipping {}", job.url);
                }
            }

            phaser.arrive_and_await_advance().await;

            for link in run.take_harvest() {
                if discovered.insert(link.clone()) {
                    tracing::debug!("Admitted {} at depth {}", link, depth + 1);
                    frontier.push(link);
                }
            }

            depth += 1;
        }

        let errors = run.take_errors();
        visited.retain(|url| !errors.contains_key(url));

        tracing::info!(
            "Crawl from {} finished: {} downloaded, {} failed, {} discovered",
            seed,
            visited.len(),
            errors.len(),
            discovered.len()
        );

        CrawlOutcome {
            downloaded: visited.into_iter().collect(),
            errors,
        }
    }

    /// Shuts both pools down
    ///
    /// Queued jobs are abandoned and reported as cancelled to any crawl still
    /// waiting on them. Workers get `shutdown_timeout` to exit; stragglers are
    /// aborted with a warning. Calling `close` again does nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown.send(true);
        self.downloads.close_queue();
        self.extractions.close_queue();

        let deadline = Instant::now() + self.shutdown_timeout;
        let aborted = self.downloads.join(deadline).await + self.extractions.join(deadline).await;

        if aborted > 0 {
            tracing::warn!(
                "Crawler workers did not stop within {:?}; {} aborted",
                self.shutdown_timeout,
                aborted
            );
        } else {
            tracing::debug!("Crawler pools shut down");
        }
    }

    /// Returns true once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for WebCrawler {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown.send(true);
        self.downloads.close_queue();
        self.extractions.close_queue();
        self.downloads.abort();
        self.extractions.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::Page;
    use crate::{DownloadError, ExtractError};
    use async_trait::async_trait;

    struct NoLinks;

    impl Page for NoLinks {
        fn extract_links(&self) -> Result<Vec<String>, ExtractError> {
            Ok(vec![])
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl Downloader for AlwaysOk {
        async fn download(&self, _url: &str) -> Result<Box<dyn Page>, DownloadError> {
            Ok(Box::new(NoLinks))
        }
    }

    #[tokio::test]
    async fn test_rejects_zero_workers() {
        let result = WebCrawler::new(Arc::new(AlwaysOk), 0, 1, 0);
        assert!(matches!(result, Err(CrawlError::InvalidArgument(_))));

        let result = WebCrawler::new(Arc::new(AlwaysOk), 1, 0, 0);
        assert!(matches!(result, Err(CrawlError::InvalidArgument(_))));
    }

    #[test]
    fn test_requires_runtime() {
        let result = WebCrawler::new(Arc::new(AlwaysOk), 1, 1, 0);
        assert!(matches!(result, Err(CrawlError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_zero_depth_returns_empty() {
        let crawler = WebCrawler::new(Arc::new(AlwaysOk), 1, 1, 0).unwrap();
        let outcome = crawler.download("A", 0).await;

        assert!(outcome.downloaded.is_empty());
        assert!(outcome.errors.is_empty());
        crawler.close().await;
    }

    #[tokio::test]
    async fn test_seed_only() {
        let crawler = WebCrawler::new(Arc::new(AlwaysOk), 2, 2, 0).unwrap();
        let outcome = crawler.download("A", 3).await;

        assert_eq!(outcome.downloaded, vec!["A".to_string()]);
        crawler.close().await;
    }

    #[tokio::test]
    async fn test_download_after_close_is_cancelled() {
        let crawler = WebCrawler::new(Arc::new(AlwaysOk), 1, 1, 0).unwrap();
        crawler.close().await;
        assert!(crawler.is_closed());

        let outcome = crawler.download("A", 2).await;
        assert!(outcome.downloaded.is_empty());
        assert!(matches!(outcome.errors.get("A"), Some(DownloadError::Cancelled)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let crawler = WebCrawler::new(Arc::new(AlwaysOk), 1, 1, 0).unwrap();
        crawler.close().await;
        crawler.close().await;
    }

    #[test]
    fn test_options_from_config() {
        let config = CrawlerConfig {
            download_workers: 3,
            extract_workers: 5,
            per_host_limit: 2,
            queue_capacity: 10,
            shutdown_timeout_ms: 250,
            ..CrawlerConfig::default()
        };

        let options = CrawlerOptions::from(&config);
        assert_eq!(options.download_workers, 3);
        assert_eq!(options.extract_workers, 5);
        assert_eq!(options.per_host_limit, 2);
        assert_eq!(options.queue_capacity, 10);
        assert_eq!(options.shutdown_timeout, Duration::from_millis(250));
    }
}
