//! Statistics over a crawl outcome
//!
//! This module groups failures by kind and prints the stdout report.

use crate::output::summary::CrawlSummary;
use crate::state::CrawlOutcome;
use crate::DownloadError;
use std::collections::BTreeMap;

/// Failure counts grouped by kind
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Number of successfully downloaded URLs
    pub downloaded: usize,

    /// Number of failed URLs
    pub failed: usize,

    /// Failure kind and count, ordered by kind
    pub errors_by_kind: BTreeMap<&'static str, usize>,
}

/// Computes statistics for an outcome
pub fn compute_statistics(outcome: &CrawlOutcome) -> CrawlStatistics {
    let mut errors_by_kind = BTreeMap::new();
    for error in outcome.errors.values() {
        *errors_by_kind.entry(error_kind(error)).or_insert(0) += 1;
    }

    CrawlStatistics {
        downloaded: outcome.downloaded.len(),
        failed: outcome.errors.len(),
        errors_by_kind,
    }
}

/// Short label for a download failure
pub fn error_kind(error: &DownloadError) -> &'static str {
    match error {
        DownloadError::InvalidUrl { .. } => "Invalid URL",
        DownloadError::Status { status: 404, .. } => "Dead link (404)",
        DownloadError::Status { status: 429, .. } => "Rate limited (429)",
        DownloadError::Status { status, .. } if *status >= 500 => "Server error (5xx)",
        DownloadError::Status { .. } => "Client error (4xx)",
        DownloadError::Timeout { .. } => "Timeout",
        DownloadError::Connect { .. } => "Unreachable",
        DownloadError::ContentMismatch { .. } => "Content mismatch",
        DownloadError::Http { .. } => "HTTP error",
        DownloadError::Cancelled => "Cancelled",
        DownloadError::Panicked { .. } => "Downloader panic",
        DownloadError::Other(_) => "Other",
    }
}

/// Prints the crawl report to stdout
pub fn print_summary(summary: &CrawlSummary, stats: &CrawlStatistics) {
    println!("=== Crawl Summary ===\n");

    println!("Seed: {}", summary.seed);
    println!("Depth: {}", summary.depth);
    println!("Elapsed: {:.2}s", summary.elapsed.as_secs_f64());
    println!();

    println!("Downloaded ({}):", summary.downloaded.len());
    for url in &summary.downloaded {
        println!("  {}", url);
    }
    println!();

    if !summary.errors.is_empty() {
        println!("Errors ({}):", summary.errors.len());
        for (url, message) in &summary.errors {
            println!("  {}: {}", url, message);
        }
        println!();

        println!("Error Summary:");
        for (kind, count) in &stats.errors_by_kind {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} URLs downloaded, {} hosts)",
        summary.success_rate(),
        stats.downloaded,
        summary.total(),
        summary.unique_hosts
    );
}
