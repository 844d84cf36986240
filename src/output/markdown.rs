//! Markdown summary generation
//!
//! This module writes a human-readable markdown report of a crawl.

use crate::output::stats::CrawlStatistics;
use crate::output::summary::{CrawlSummary, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown report to `output_path`
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn write_markdown_summary(
    summary: &CrawlSummary,
    stats: &CrawlStatistics,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary, stats);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary, stats: &CrawlStatistics) -> String {
    let mut md = String::new();

    md.push_str("# Phased-Crawler Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", summary.seed));
    md.push_str(&format!("- **Depth**: {}\n", summary.depth));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        summary.elapsed.as_secs_f64()
    ));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Downloaded**: {}\n", summary.downloaded.len()));
    md.push_str(&format!("- **Failed**: {}\n", summary.errors.len()));
    md.push_str(&format!("- **Unique Hosts**: {}\n", summary.unique_hosts));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        summary.success_rate()
    ));
    md.push_str(&format!(
        "- **Error Rate**: {:.2}%\n\n",
        summary.error_rate()
    ));

    if !stats.errors_by_kind.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error Type | Count |\n");
        md.push_str("|------------|-------|\n");
        for (kind, count) in &stats.errors_by_kind {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    md.push_str("## Downloaded URLs\n\n");
    if summary.downloaded.is_empty() {
        md.push_str("_None_\n\n");
    } else {
        for url in &summary.downloaded {
            md.push_str(&format!("- {}\n", url));
        }
        md.push('\n');
    }

    if !summary.errors.is_empty() {
        md.push_str("## Failed URLs\n\n");
        md.push_str("| URL | Error |\n");
        md.push_str("|-----|-------|\n");
        for (url, message) in &summary.errors {
            md.push_str(&format!("| {} | {} |\n", url, message.replace('|', "\\|")));
        }
        md.push('\n');
    }

    md
}
