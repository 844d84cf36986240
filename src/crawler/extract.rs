//! Extraction pool jobs
//!
//! Parsing is CPU-bound, so the page's `extract_links` runs on tokio's
//! blocking thread pool while the async worker only waits for it. Failures
//! are logged and the page contributes no links; they never enter the
//! crawl's error map.

use crate::crawler::downloader::Page;
use crate::crawler::phaser::PhaseTicket;
use crate::state::CrawlRun;
use std::sync::Arc;

pub(crate) struct ExtractJob {
    pub(crate) url: String,
    pub(crate) page: Box<dyn Page>,
    pub(crate) run: Arc<CrawlRun>,
    pub(crate) ticket: PhaseTicket,
}

pub(crate) async fn run_extraction(job: ExtractJob) {
    let ExtractJob {
        url,
        page,
        run,
        ticket,
    } = job;

    match tokio::task::spawn_blocking(move || page.extract_links()).await {
        Ok(Ok(links)) => {
            tracing::trace!("Extracted {} links from {}", links.len(), url);
            run.harvest(links);
        }
        Ok(Err(e)) => {
            tracing::warn!("Failed to extract links from {}: {}", url, e);
        }
        Err(e) => {
            tracing::warn!("Link extraction for {} did not complete: {}", url, e);
        }
    }

    ticket.arrive();
}
