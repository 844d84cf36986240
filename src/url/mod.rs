//! URL handling for the default downloader
//!
//! The crawl core compares URLs by plain string equality. Normalization of
//! discovered links happens here, on the downloader side, before links are
//! handed back to the crawler.

mod domain;
mod normalize;

pub use domain::{extract_domain, host_of};
pub use normalize::normalize_url;
