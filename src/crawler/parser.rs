//! HTML link extraction for the default downloader
//!
//! This module turns a downloaded HTML body into the outbound links the
//! crawler follows.

use crate::crawler::downloader::Page;
use crate::url::normalize_url;
use crate::ExtractError;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// An HTML page fetched by [`HttpDownloader`](crate::crawler::HttpDownloader)
#[derive(Debug, Clone)]
pub struct HtmlPage {
    /// Final URL after redirects; relative links resolve against it
    pub url: Url,

    /// Raw HTML body
    pub body: String,
}

impl HtmlPage {
    pub fn new(url: Url, body: String) -> Self {
        Self { url, body }
    }
}

impl Page for HtmlPage {
    fn extract_links(&self) -> Result<Vec<String>, ExtractError> {
        extract_links(&self.body, &self.url)
    }
}

/// Extracts the links to follow from an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links (same page anchors)
/// - Anything that does not resolve to an HTTP(S) URL
///
/// Links are normalized and deduplicated, keeping the first occurrence.
///
/// # Example
///
/// ```
/// use phased_crawler::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<html><body><a href="/page#top">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let links = extract_links(html, &base_url).unwrap();
/// assert_eq!(links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn extract_links(html: &str, base_url: &Url) -> Result<Vec<String>, ExtractError> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let anchors = selector("a[href]", base_url)?;
    let canonical = selector("link[rel='canonical'][href]", base_url)?;

    let hrefs = document
        .select(&anchors)
        .filter(|element| element.value().attr("download").is_none())
        .chain(document.select(&canonical))
        .filter_map(|element| element.value().attr("href"));

    for href in hrefs {
        if let Some(absolute_url) = resolve_link(href, base_url) {
            if seen.insert(absolute_url.clone()) {
                links.push(absolute_url);
            }
        }
    }

    Ok(links)
}

fn selector(css: &str, base_url: &Url) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::HtmlParse {
        url: base_url.to_string(),
        message: format!("invalid selector {}: {:?}", css, e),
    })
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    normalize_url(absolute_url.as_str())
        .ok()
        .map(|url| url.to_string())
}
