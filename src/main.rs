//! Phased-Crawler main entry point
//!
//! This is the command-line interface for the Phased-Crawler breadth-first
//! crawler.

use anyhow::Context;
use clap::Parser;
use phased_crawler::config::{load_config_with_hash, validate, Config};
use phased_crawler::crawler::crawl;
use phased_crawler::output::{
    compute_statistics, print_summary, write_markdown_summary, CrawlStatistics, CrawlSummary,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Phased-Crawler: a bounded-parallelism breadth-first web crawler
///
/// Downloads every page reachable from SEED within DEPTH levels, using
/// separate worker pools for downloads and link extraction. Values left out
/// on the command line come from the config file, or the built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "phased-crawler")]
#[command(version)]
#[command(about = "A bounded-parallelism breadth-first web crawler", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(value_name = "SEED")]
    seed: String,

    /// Maximum traversal depth; 1 downloads only the seed [default: 2]
    #[arg(value_name = "DEPTH")]
    depth: Option<usize>,

    /// Number of concurrent downloads [default: 8]
    #[arg(value_name = "DOWNLOADERS")]
    download_workers: Option<usize>,

    /// Number of concurrent link extractions [default: 4]
    #[arg(value_name = "EXTRACTORS")]
    extract_workers: Option<usize>,

    /// Maximum concurrent downloads per host, 0 for unlimited [default: 0]
    #[arg(value_name = "PER_HOST")]
    per_host: Option<usize>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a markdown summary to this file
    #[arg(short, long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_configuration(&cli)?;

    tracing::info!(
        "Crawling {} to depth {} ({} downloaders, {} extractors, per-host limit {})",
        cli.seed,
        config.crawler.depth,
        config.crawler.download_workers,
        config.crawler.extract_workers,
        config.crawler.per_host_limit
    );

    let started = Instant::now();
    let outcome = crawl(&config, &cli.seed)
        .await
        .context("Failed to start the crawler")?;
    let elapsed = started.elapsed();

    tracing::info!(
        "Crawl finished in {:.2}s: {} downloaded, {} failed",
        elapsed.as_secs_f64(),
        outcome.downloaded.len(),
        outcome.errors.len()
    );

    let mut summary = CrawlSummary::new(&cli.seed, config.crawler.depth, elapsed, &outcome);
    if let Some(hash) = config_hash {
        summary = summary.with_config_hash(hash);
    }
    let stats = compute_statistics(&outcome);

    if !cli.quiet {
        print_summary(&summary, &stats);
    }

    let summary_path = cli
        .summary
        .clone()
        .or_else(|| config.output.summary_path.as_ref().map(PathBuf::from));
    if let Some(path) = summary_path {
        write_summary(&summary, &stats, &path)?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("phased_crawler=info,warn"),
            1 => EnvFilter::new("phased_crawler=debug,info"),
            2 => EnvFilter::new("phased_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file (if any), applies command-line overrides and
/// validates the result
fn load_configuration(cli: &Cli) -> anyhow::Result<(Config, Option<String>)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    if let Some(depth) = cli.depth {
        config.crawler.depth = depth;
    }
    if let Some(workers) = cli.download_workers {
        config.crawler.download_workers = workers;
    }
    if let Some(workers) = cli.extract_workers {
        config.crawler.extract_workers = workers;
    }
    if let Some(limit) = cli.per_host {
        config.crawler.per_host_limit = limit;
    }

    validate(&config).context("Invalid crawler settings")?;
    Ok((config, hash))
}

fn write_summary(
    summary: &CrawlSummary,
    stats: &CrawlStatistics,
    path: &Path,
) -> anyhow::Result<()> {
    write_markdown_summary(summary, stats, path)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    tracing::info!("Summary written to: {}", path.display());
    Ok(())
}
