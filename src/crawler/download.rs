//! Download pool jobs
//!
//! A download job fetches one URL. On success, and only while the URL's
//! depth is short of the final depth, it hands the page to the extraction
//! pool under a freshly forked phase ticket before its own ticket arrives.

use crate::concurrent::panic_message;
use crate::crawler::downloader::{Downloader, Page};
use crate::crawler::extract::ExtractJob;
use crate::crawler::host_limit::HostLimiter;
use crate::crawler::phaser::PhaseTicket;
use crate::crawler::pool::{AbortOnDrop, WorkerPool};
use crate::state::CrawlRun;
use crate::DownloadError;
use std::sync::Arc;

pub(crate) struct DownloadJob {
    pub(crate) url: String,
    pub(crate) depth: usize,
    pub(crate) max_depth: usize,
    pub(crate) run: Arc<CrawlRun>,
    pub(crate) ticket: PhaseTicket,
    finished: bool,
}

impl DownloadJob {
    pub(crate) fn new(
        url: String,
        depth: usize,
        max_depth: usize,
        run: Arc<CrawlRun>,
        ticket: PhaseTicket,
    ) -> Self {
        Self {
            url,
            depth,
            max_depth,
            run,
            ticket,
            finished: false,
        }
    }

    /// Links of this page are harvested only below the final depth
    fn wants_extraction(&self) -> bool {
        self.depth + 1 < self.max_depth
    }
}

// A job dropped before it ran (pool closed or shut down) counts as a failed
// download, so the URL cannot be reported as visited.
impl Drop for DownloadJob {
    fn drop(&mut self) {
        if !self.finished {
            self.run
                .record_error(std::mem::take(&mut self.url), DownloadError::Cancelled);
        }
    }
}

/// Everything a download worker needs besides the job itself
pub(crate) struct DownloadContext {
    pub(crate) downloader: Arc<dyn Downloader>,
    pub(crate) hosts: HostLimiter,
    pub(crate) extractions: Arc<WorkerPool<ExtractJob>>,
}

pub(crate) async fn run_download(ctx: Arc<DownloadContext>, mut job: DownloadJob) {
    let permit = ctx.hosts.acquire(&job.url).await;
    let result = download_guarded(&ctx.downloader, &job.url).await;
    drop(permit);

    job.finished = true;

    let page = match result {
        Ok(page) => page,
        Err(e) => {
            tracing::debug!("Download failed for {}: {}", job.url, e);
            job.run.record_error(job.url.clone(), e);
            return;
        }
    };

    tracing::trace!("Downloaded {} at depth {}", job.url, job.depth);

    if !job.wants_extraction() {
        return;
    }

    let extraction = ExtractJob {
        url: job.url.clone(),
        page,
        run: Arc::clone(&job.run),
        ticket: job.ticket.fork(),
    };

    if let Err(dropped) = ctx.extractions.submit(extraction).await {
        tracing::warn!(
            "Extraction pool is closed; links of {} were not harvested",
            dropped.url
        );
    }
}

/// Runs the downloader in its own task so a panic fails only this URL
async fn download_guarded(
    downloader: &Arc<dyn Downloader>,
    url: &str,
) -> Result<Box<dyn Page>, DownloadError> {
    let task = {
        let downloader = Arc::clone(downloader);
        let url = url.to_string();
        AbortOnDrop::spawn(async move { downloader.download(&url).await })
    };

    match task.join().await {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic().as_ref());
            tracing::error!("Downloader panicked on {}: {}", url, message);
            Err(DownloadError::Panicked {
                url: url.to_string(),
                message,
            })
        }
        Err(_) => Err(DownloadError::Cancelled),
    }
}
