//! HTTP downloader implementation
//!
//! This module provides the default [`Downloader`]:
//! - Building an HTTP client with a proper user agent string
//! - GET requests with timeouts
//! - Error classification into [`DownloadError`] variants

use crate::config::{HttpConfig, UserAgentConfig};
use crate::crawler::downloader::{Downloader, Page};
use crate::crawler::parser::HtmlPage;
use crate::{CrawlError, DownloadError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use phased_crawler::config::{HttpConfig, UserAgentConfig};
/// use phased_crawler::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    http: &HttpConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(http.timeout_secs))
        .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Downloads pages over HTTP(S) and parses them as HTML
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    html_only: bool,
}

impl HttpDownloader {
    /// Creates a downloader; fails if the HTTP client cannot be initialized
    pub fn new(user_agent: &UserAgentConfig, http: &HttpConfig) -> Result<Self, CrawlError> {
        let client = build_http_client(user_agent, http)?;
        Ok(Self::with_client(client, http.html_only))
    }

    /// Creates a downloader around an existing client
    pub fn with_client(client: Client, html_only: bool) -> Self {
        Self { client, html_only }
    }

    /// Fetches a URL and returns the page on success
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Unparsable URL | `InvalidUrl` |
    /// | HTTP 4xx / 5xx | `Status` |
    /// | Timeout | `Timeout` |
    /// | Connection refused / TLS failure | `Connect` |
    /// | Non-HTML Content-Type (when `html_only`) | `ContentMismatch` |
    /// | Anything else from the client | `Http` |
    pub async fn fetch(&self, url: &str) -> Result<HtmlPage, DownloadError> {
        let parsed = Url::parse(url).map_err(|source| DownloadError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if self.html_only && !is_html(&content_type) {
            return Err(DownloadError::ContentMismatch {
                url: url.to_string(),
                content_type,
            });
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(url, e))?;

        Ok(HtmlPage::new(final_url, body))
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str) -> Result<Box<dyn Page>, DownloadError> {
        let page = self.fetch(url).await?;
        Ok(Box::new(page))
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

fn classify_error(url: &str, e: reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        DownloadError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        DownloadError::Connect {
            url: url.to_string(),
        }
    } else {
        DownloadError::Http {
            url: url.to_string(),
            source: e,
        }
    }
}
