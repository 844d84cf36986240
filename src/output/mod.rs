//! Output module for crawl reports
//!
//! This module handles:
//! - Building a sorted summary of a finished crawl
//! - Grouping failures into statistics
//! - Printing the report to stdout and writing it as markdown

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use stats::{compute_statistics, error_kind, print_summary, CrawlStatistics};
pub use summary::{CrawlSummary, OutputError, OutputResult};
