//! Integration tests for the crawler
//!
//! Most tests crawl an in-memory link graph through a counting downloader.
//! The last group runs the default HTTP downloader end-to-end against
//! wiremock servers.

use async_trait::async_trait;
use phased_crawler::config::{Config, HttpConfig, UserAgentConfig};
use phased_crawler::crawler::{crawl, CrawlerOptions};
use phased_crawler::url::host_of;
use phased_crawler::{DownloadError, Downloader, ExtractError, HttpDownloader, Page, WebCrawler};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Per-URL call counters shared between the downloader and its pages
#[derive(Default)]
struct Counters {
    downloads: Mutex<HashMap<String, usize>>,
    extractions: Mutex<HashMap<String, usize>>,
    active_per_host: Mutex<HashMap<String, usize>>,
    peak_per_host: Mutex<HashMap<String, usize>>,
}

impl Counters {
    fn downloads_of(&self, url: &str) -> usize {
        self.downloads.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn extractions_of(&self, url: &str) -> usize {
        self.extractions.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn peak_of(&self, host: &str) -> usize {
        self.peak_per_host.lock().unwrap().get(host).copied().unwrap_or(0)
    }
}

/// Downloader over a fixed link graph
#[derive(Default)]
struct GraphDownloader {
    edges: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    broken_pages: HashSet<String>,
    delay: Duration,
    counters: Arc<Counters>,
}

impl GraphDownloader {
    fn new(edges: &[(&str, &str)]) -> Self {
        let mut graph: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in edges {
            graph.entry(from.to_string()).or_default().push(to.to_string());
        }
        Self {
            edges: graph,
            ..Self::default()
        }
    }

    fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    fn panicking(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    fn unparsable(mut self, url: &str) -> Self {
        self.broken_pages.insert(url.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

struct GraphPage {
    url: String,
    links: Vec<String>,
    broken: bool,
    counters: Arc<Counters>,
}

impl Page for GraphPage {
    fn extract_links(&self) -> Result<Vec<String>, ExtractError> {
        *self
            .counters
            .extractions
            .lock()
            .unwrap()
            .entry(self.url.clone())
            .or_insert(0) += 1;

        if self.broken {
            return Err(ExtractError::Other(format!("cannot parse {}", self.url)));
        }
        Ok(self.links.clone())
    }
}

#[async_trait]
impl Downloader for GraphDownloader {
    async fn download(&self, url: &str) -> Result<Box<dyn Page>, DownloadError> {
        if self.panicking.contains(url) {
            panic!("downloader bug on {}", url);
        }

        *self
            .counters
            .downloads
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let host = host_of(url).unwrap_or_default();
        {
            let mut active = self.counters.active_per_host.lock().unwrap();
            let now = active.entry(host.clone()).or_insert(0);
            *now += 1;
            let mut peak = self.counters.peak_per_host.lock().unwrap();
            let max = peak.entry(host.clone()).or_insert(0);
            *max = (*max).max(*now);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        *self
            .counters
            .active_per_host
            .lock()
            .unwrap()
            .entry(host)
            .or_insert(1) -= 1;

        if self.failing.contains(url) {
            return Err(DownloadError::Other(format!("refused {}", url)));
        }

        Ok(Box::new(GraphPage {
            url: url.to_string(),
            links: self.edges.get(url).cloned().unwrap_or_default(),
            broken: self.broken_pages.contains(url),
            counters: Arc::clone(&self.counters),
        }))
    }
}

fn sorted(urls: &[String]) -> Vec<&str> {
    let mut urls: Vec<&str> = urls.iter().map(String::as_str).collect();
    urls.sort_unstable();
    urls
}

const TREE: [(&str, &str); 3] = [("A", "B"), ("A", "C"), ("B", "D")];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_depth_two_stops_after_direct_links() {
    let downloader = Arc::new(GraphDownloader::new(&TREE));
    let counters = Arc::clone(&downloader.counters);
    let crawler = WebCrawler::new(downloader, 4, 2, 0).unwrap();

    let outcome = crawler.download("A", 2).await;

    // D is two hops away and lies beyond depth 2
    assert_eq!(sorted(&outcome.downloaded), vec!["A", "B", "C"]);
    assert!(outcome.errors.is_empty());
    assert_eq!(counters.downloads_of("D"), 0);

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_depth_three_reaches_grandchildren() {
    let crawler = WebCrawler::new(Arc::new(GraphDownloader::new(&TREE)), 4, 2, 0).unwrap();

    let outcome = crawler.download("A", 3).await;

    assert_eq!(sorted(&outcome.downloaded), vec!["A", "B", "C", "D"]);
    assert!(outcome.errors.is_empty());

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_depth_one_downloads_only_seed() {
    let downloader = Arc::new(GraphDownloader::new(&TREE));
    let counters = Arc::clone(&downloader.counters);
    let crawler = WebCrawler::new(downloader, 4, 2, 0).unwrap();

    let outcome = crawler.download("A", 1).await;

    assert_eq!(outcome.downloaded, vec!["A".to_string()]);
    assert!(outcome.errors.is_empty());
    assert_eq!(counters.extractions_of("A"), 0);

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cycle_downloads_each_url_once() {
    let downloader = Arc::new(GraphDownloader::new(&[("A", "B"), ("B", "A")]));
    let counters = Arc::clone(&downloader.counters);
    let crawler = WebCrawler::new(downloader, 4, 2, 0).unwrap();

    let outcome = crawler.download("A", 3).await;

    assert_eq!(sorted(&outcome.downloaded), vec!["A", "B"]);
    assert_eq!(counters.downloads_of("A"), 1);
    assert_eq!(counters.downloads_of("B"), 1);

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_download_is_reported_not_downloaded() {
    let downloader = Arc::new(GraphDownloader::new(&[("A", "B"), ("A", "C")]).failing("B"));
    let crawler = WebCrawler::new(downloader, 4, 2, 0).unwrap();

    let outcome = crawler.download("A", 2).await;

    assert_eq!(sorted(&outcome.downloaded), vec!["A", "C"]);
    assert_eq!(outcome.errors.len(), 1);
    assert!(matches!(outcome.errors.get("B"), Some(DownloadError::Other(_))));

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_downloader_panic_fails_only_that_url() {
    let downloader = Arc::new(GraphDownloader::new(&[("A", "B"), ("A", "C")]).panicking("B"));
    let crawler = WebCrawler::new(downloader, 1, 1, 0).unwrap();

    let outcome = crawler.download("A", 2).await;

    assert_eq!(sorted(&outcome.downloaded), vec!["A", "C"]);
    assert_eq!(outcome.errors.len(), 1);
    match outcome.errors.get("B") {
        Some(DownloadError::Panicked { url, message }) => {
            assert_eq!(url, "B");
            assert!(message.contains("downloader bug on B"));
        }
        other => panic!("expected a downloader panic for B, got {:?}", other),
    }

    // The single download worker survived
    let later = crawler.download("X", 1).await;
    assert_eq!(later.downloaded, vec!["X".to_string()]);
    assert!(later.errors.is_empty());

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_seed() {
    let downloader = Arc::new(GraphDownloader::new(&TREE).failing("A"));
    let crawler = WebCrawler::new(downloader, 2, 2, 0).unwrap();

    let outcome = crawler.download("A", 3).await;

    assert!(outcome.downloaded.is_empty());
    assert!(outcome.errors.contains_key("A"));

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_links_are_not_extracted_at_last_depth() {
    let downloader = Arc::new(GraphDownloader::new(&TREE));
    let counters = Arc::clone(&downloader.counters);
    let crawler = WebCrawler::new(downloader, 4, 2, 0).unwrap();

    crawler.download("A", 2).await;

    assert_eq!(counters.extractions_of("A"), 1);
    assert_eq!(counters.extractions_of("B"), 0);
    assert_eq!(counters.extractions_of("C"), 0);

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_extraction_failure_is_not_an_error() {
    let downloader = Arc::new(GraphDownloader::new(&TREE).unparsable("B"));
    let crawler = WebCrawler::new(downloader, 4, 2, 0).unwrap();

    let outcome = crawler.download("A", 3).await;

    // B downloaded fine; only its links are lost
    assert_eq!(sorted(&outcome.downloaded), vec!["A", "B", "C"]);
    assert!(outcome.errors.is_empty());

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wide_graph_is_disjoint_and_unique() {
    // Every page links to every other page, including failing ones
    let nodes: Vec<String> = (0..30).map(|i| format!("N{}", i)).collect();
    let mut edges = Vec::new();
    for from in &nodes {
        for to in &nodes {
            edges.push((from.as_str(), to.as_str()));
        }
    }

    let mut downloader = GraphDownloader::new(&edges);
    for i in (0..30).step_by(7) {
        downloader = downloader.failing(&format!("N{}", i));
    }
    let downloader = Arc::new(downloader.failing("N3"));
    let counters = Arc::clone(&downloader.counters);
    let crawler = WebCrawler::new(downloader, 8, 3, 0).unwrap();

    let outcome = crawler.download("N1", 4).await;

    let downloaded: HashSet<&String> = outcome.downloaded.iter().collect();
    assert_eq!(downloaded.len(), outcome.downloaded.len());
    for url in outcome.errors.keys() {
        assert!(!downloaded.contains(url), "{} is in both results", url);
    }
    assert_eq!(outcome.total(), 30);
    for node in &nodes {
        assert_eq!(counters.downloads_of(node), 1, "{} downloaded more than once", node);
    }

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_per_host_limit_caps_concurrency() {
    let pages: Vec<String> = (0..12).map(|i| format!("http://slow.test/p{}", i)).collect();
    let edges: Vec<(&str, &str)> = pages
        .iter()
        .map(|page| ("http://hub.test/", page.as_str()))
        .collect();

    let downloader =
        Arc::new(GraphDownloader::new(&edges).with_delay(Duration::from_millis(40)));
    let counters = Arc::clone(&downloader.counters);
    let crawler = WebCrawler::new(downloader, 8, 2, 2).unwrap();

    let outcome = crawler.download("http://hub.test/", 2).await;

    assert_eq!(outcome.downloaded.len(), 13);
    assert!(counters.peak_of("slow.test") <= 2);
    assert!(counters.peak_of("slow.test") >= 1);

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crawler_is_reusable_and_concurrent() {
    let downloader = Arc::new(GraphDownloader::new(&TREE));
    let crawler = Arc::new(WebCrawler::new(downloader, 4, 2, 0).unwrap());

    let first = {
        let crawler = Arc::clone(&crawler);
        tokio::spawn(async move { crawler.download("A", 3).await })
    };
    let second = {
        let crawler = Arc::clone(&crawler);
        tokio::spawn(async move { crawler.download("B", 2).await })
    };

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert_eq!(sorted(&first.downloaded), vec!["A", "B", "C", "D"]);
    assert_eq!(sorted(&second.downloaded), vec!["B", "D"]);

    // A later call starts from scratch
    let third = crawler.download("A", 1).await;
    assert_eq!(third.downloaded, vec!["A".to_string()]);

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_small_queues_do_not_deadlock() {
    let pages: Vec<String> = (0..50).map(|i| format!("P{}", i)).collect();
    let mut edges: Vec<(&str, &str)> = pages.iter().map(|p| ("root", p.as_str())).collect();
    for window in pages.windows(2) {
        edges.push((window[0].as_str(), window[1].as_str()));
    }

    let options = CrawlerOptions {
        download_workers: 2,
        extract_workers: 1,
        queue_capacity: 1,
        ..CrawlerOptions::default()
    };
    let crawler = WebCrawler::with_options(Arc::new(GraphDownloader::new(&edges)), options).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), crawler.download("root", 3))
        .await
        .expect("crawl should not hang");

    assert_eq!(outcome.downloaded.len(), 51);
    crawler.close().await;
}

// ---------------------------------------------------------------------------
// HTTP end-to-end
// ---------------------------------------------------------------------------

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

async fn mount_site(server: &MockServer) {
    let base_url = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><body>
                <a href="{}/page1">Page 1</a>
                <a href="/missing">Missing</a>
                <a href="/data.json">Data</a>
                <a href="mailto:someone@example.com">Mail</a>
            </body></html>"#,
            base_url
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(r#"<html><body><a href="page2#top">Page 2</a></body></html>"#.to_string()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_http_crawl_classifies_failures() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html("<html></html>".to_string()))
        .expect(0)
        .mount(&server)
        .await;

    let downloader =
        HttpDownloader::new(&UserAgentConfig::default(), &HttpConfig::default()).unwrap();
    let crawler = WebCrawler::new(Arc::new(downloader), 4, 2, 0).unwrap();

    let base = server.uri();
    let seed = format!("{}/", base);
    let outcome = crawler.download(&seed, 2).await;

    assert_eq!(
        sorted(&outcome.downloaded),
        vec![seed.as_str(), format!("{}/page1", base).as_str()]
    );
    assert!(matches!(
        outcome.errors.get(&format!("{}/missing", base)),
        Some(DownloadError::Status { status: 404, .. })
    ));
    assert!(matches!(
        outcome.errors.get(&format!("{}/data.json", base)),
        Some(DownloadError::ContentMismatch { .. })
    ));
    assert_eq!(outcome.errors.len(), 2);

    crawler.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crawl_entry_point_follows_relative_links() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html("<html><body>leaf</body></html>".to_string()))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.crawler.depth = 3;
    config.crawler.download_workers = 2;
    config.crawler.extract_workers = 1;

    let base = server.uri();
    let outcome = crawl(&config, &format!("{}/", base)).await.unwrap();

    assert!(outcome
        .downloaded
        .contains(&format!("{}/page2", base)));
    assert_eq!(outcome.downloaded.len(), 3);
    assert_eq!(outcome.errors.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unreachable_host_is_recorded() {
    // Nothing listens on port 9 of the loopback interface
    let downloader =
        HttpDownloader::new(&UserAgentConfig::default(), &HttpConfig::default()).unwrap();
    let crawler = WebCrawler::new(Arc::new(downloader), 1, 1, 0).unwrap();

    let outcome = crawler.download("http://127.0.0.1:9/", 2).await;

    assert!(outcome.downloaded.is_empty());
    assert!(matches!(
        outcome.errors.get("http://127.0.0.1:9/"),
        Some(DownloadError::Connect { .. })
    ));

    crawler.close().await;
}
