use crate::{UrlError, UrlResult};
use url::Url;

/// Tracking query parameters removed during normalization
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Normalizes a discovered link
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Require a host (the parser lowercases it)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters, dropping an empty query entirely
///
/// Paths, trailing slashes and parameter order are left alone: two links that
/// differ there may name different resources.
///
/// # Examples
///
/// ```
/// use phased_crawler::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM/page?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    // Kept pairs stay byte-for-byte as written; the query is only rebuilt
    // when something was removed
    if let Some(query) = url.query().map(str::to_owned) {
        let pairs: Vec<&str> = query.split('&').collect();
        let kept: Vec<&str> = pairs
            .iter()
            .copied()
            .filter(|pair| !is_tracking_param(pair.split('=').next().unwrap_or("")))
            .collect();

        if kept.len() != pairs.len() {
            let rebuilt = kept.join("&");
            url.set_query(if rebuilt.is_empty() { None } else { Some(&rebuilt) });
        }
    }

    Ok(url)
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
