//! Preview images for externally linked portfolio items
//!
//! A lookup normalizes the link, fetches the page through a [`PageSource`]
//! under a hard timeout and extracts the `og:image` (or favicon) URL. Both
//! hits and misses are cached for the lifetime of the [`PreviewCache`].
//! A missing preview is an expected outcome and is reported as `None`.

use async_trait::async_trait;
use moka::future::Cache;
use regex::Regex;
use reqwest::Url;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

/// Default bound on a single page fetch
pub const DEFAULT_PREVIEW_TIMEOUT: Duration = Duration::from_secs(10);

/// Default upper bound of cached lookups
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// External endpoint returning the HTML of an arbitrary page
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_html(&self, url: &Url) -> anyhow::Result<String>;
}

/// Fetches pages directly over HTTP
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_html(&self, url: &Url) -> anyhow::Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Process-lifetime map from link to preview image, `None` meaning
/// "looked up, nothing found"
///
/// Entries never expire. The one exception is the capacity bound: once
/// `max_capacity` distinct links are cached, older entries may be evicted
/// and a later lookup of an evicted link fetches the page again.
#[derive(Debug, Clone)]
pub struct PreviewCache {
    inner: Cache<String, Option<String>>,
}

impl PreviewCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    pub async fn get(&self, url: &str) -> Option<Option<String>> {
        self.inner.get(url).await
    }

    pub async fn insert(&self, url: String, image: Option<String>) {
        self.inner.insert(url, image).await;
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.inner.get(url).await.is_some()
    }
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Resolves and caches preview images for links
#[derive(Clone)]
pub struct LinkPreviewFetcher {
    source: Arc<dyn PageSource>,
    cache: PreviewCache,
    timeout: Duration,
}

impl LinkPreviewFetcher {
    pub fn new(source: Arc<dyn PageSource>, cache: PreviewCache) -> Self {
        Self {
            source,
            cache,
            timeout: DEFAULT_PREVIEW_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &PreviewCache {
        &self.cache
    }

    /// Preview image for `url`, or `None` when the page has none or could
    /// not be fetched in time
    pub async fn get_preview(&self, url: &str) -> Option<String> {
        if let Some(cached) = self.cache.get(url).await {
            return cached;
        }

        let image = self.lookup(url).await;
        self.cache.insert(url.to_string(), image.clone()).await;
        image
    }

    async fn lookup(&self, url: &str) -> Option<String> {
        let Some(page) = normalize_url(url) else {
            debug!(url, "link is not a valid URL, no preview");
            return None;
        };

        match tokio::time::timeout(self.timeout, self.source.fetch_html(&page)).await {
            Ok(Ok(html)) => extract_preview_image(&html, &page),
            Ok(Err(e)) => {
                debug!(url = %page, error = %e, "preview fetch failed");
                None
            }
            Err(_) => {
                debug!(url = %page, timeout_ms = self.timeout.as_millis() as u64, "preview fetch timed out");
                None
            }
        }
    }
}

/// Absolute form of a link, assuming https when no scheme is given
pub fn normalize_url(url: &str) -> Option<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_ascii_lowercase();
    let absolute = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    Url::parse(&absolute).ok()
}

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid meta regex"));
static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("valid link regex"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([a-zA-Z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});

const IMAGE_PROPERTIES: [&str; 3] = ["og:image", "og:image:secure_url", "twitter:image"];

/// Preview image URL declared by a page, resolved against the page origin.
///
/// `og:image` wins; `twitter:image` and then the favicon are fallbacks.
pub fn extract_preview_image(html: &str, page: &Url) -> Option<String> {
    let metas: Vec<Vec<(String, String)>> = META_TAG
        .find_iter(html)
        .map(|tag| attributes(tag.as_str()))
        .collect();

    for property in IMAGE_PROPERTIES {
        let declared = metas.iter().find_map(|attrs| {
            let is_match = attrs.iter().any(|(name, value)| {
                (name == "property" || name == "name") && value.eq_ignore_ascii_case(property)
            });
            if is_match {
                attribute(attrs, "content")
            } else {
                None
            }
        });
        if let Some(resolved) = declared.and_then(|href| resolve_against_origin(href, page)) {
            return Some(resolved);
        }
    }

    LINK_TAG
        .find_iter(html)
        .map(|tag| attributes(tag.as_str()))
        .filter(|attrs| {
            attribute(attrs, "rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("icon"))
            })
        })
        .find_map(|attrs| attribute(&attrs, "href").and_then(|href| resolve_against_origin(href, page)))
}

fn attributes(tag: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((name, decode_entities(value)))
        })
        .collect()
}

fn attribute<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn resolve_against_origin(href: &str, page: &Url) -> Option<String> {
    let origin = page.join("/").ok()?;
    let resolved = origin.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    struct CountingSource {
        html: Option<String>,
        delay: Duration,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl CountingSource {
        fn serving(html: Option<&str>) -> Self {
            Self {
                html: html.map(str::to_string),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for CountingSource {
        async fn fetch_html(&self, url: &Url) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(url.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.html
                .clone()
                .ok_or_else(|| anyhow::anyhow!("HTTP 404"))
        }
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("example.com/page").unwrap().as_str(),
            "https://example.com/page"
        );
        assert_eq!(
            normalize_url("HTTP://example.com").unwrap().as_str(),
            "http://example.com/"
        );
        assert!(normalize_url("").is_none());
        assert!(normalize_url("   ").is_none());
    }

    #[test]
    fn test_extracts_og_image_in_either_attribute_order() {
        let base = page("https://example.com/blog/post");
        let html = r#"<head><meta content="https://cdn.example.com/a.png" property="og:image"></head>"#;
        assert_eq!(
            extract_preview_image(html, &base).as_deref(),
            Some("https://cdn.example.com/a.png")
        );

        let html = r#"<meta property='og:image' content='/img/cover.jpg?a=1&amp;b=2' />"#;
        assert_eq!(
            extract_preview_image(html, &base).as_deref(),
            Some("https://example.com/img/cover.jpg?a=1&b=2")
        );
    }

    #[test]
    fn test_relative_image_resolves_against_origin() {
        let base = page("https://example.com/blog/post");
        let html = r#"<meta property="og:image" content="images/cover.png">"#;
        assert_eq!(
            extract_preview_image(html, &base).as_deref(),
            Some("https://example.com/images/cover.png")
        );
    }

    #[test]
    fn test_falls_back_to_favicon() {
        let base = page("https://example.com/");
        let html = r#"<link rel="stylesheet" href="/site.css"><link href="/favicon.ico" rel="shortcut icon">"#;
        assert_eq!(
            extract_preview_image(html, &base).as_deref(),
            Some("https://example.com/favicon.ico")
        );
    }

    #[test]
    fn test_no_image_found() {
        let base = page("https://example.com/");
        let html = "<html><head><title>Plain</title></head></html>";
        assert_eq!(extract_preview_image(html, &base), None);
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let source = Arc::new(CountingSource::serving(Some(
            r#"<meta property="og:image" content="/cover.png">"#,
        )));
        let fetcher = LinkPreviewFetcher::new(source.clone(), PreviewCache::new(100));

        let first = fetcher.get_preview("example.com/page").await;
        let second = fetcher.get_preview("example.com/page").await;

        assert_eq!(first.as_deref(), Some("https://example.com/cover.png"));
        assert_eq!(first, second);
        assert_eq!(source.calls(), 1);
        assert_eq!(source.seen.lock()[0], "https://example.com/page");
    }

    #[tokio::test]
    async fn test_failed_lookup_is_cached_as_none() {
        let source = Arc::new(CountingSource::serving(None));
        let fetcher = LinkPreviewFetcher::new(source.clone(), PreviewCache::new(100));

        assert_eq!(fetcher.get_preview("https://gone.example.com").await, None);
        assert_eq!(fetcher.get_preview("https://gone.example.com").await, None);
        assert_eq!(source.calls(), 1);
        assert!(fetcher.cache().contains("https://gone.example.com").await);
    }

    #[tokio::test]
    async fn test_timeout_resolves_to_none() {
        let mut slow = CountingSource::serving(Some(r#"<meta property="og:image" content="/x.png">"#));
        slow.delay = Duration::from_secs(5);
        let fetcher = LinkPreviewFetcher::new(Arc::new(slow), PreviewCache::new(100))
            .with_timeout(Duration::from_millis(20));

        assert_eq!(fetcher.get_preview("slow.example.com").await, None);
        assert_eq!(fetcher.cache().get("slow.example.com").await, Some(None));
    }

    #[tokio::test]
    async fn test_injected_cache_is_shared() {
        let cache = PreviewCache::new(100);
        cache
            .insert("known.example.com".to_string(), Some("https://known.example.com/i.png".to_string()))
            .await;
        let source = Arc::new(CountingSource::serving(None));
        let fetcher = LinkPreviewFetcher::new(source.clone(), cache);

        assert_eq!(
            fetcher.get_preview("known.example.com").await.as_deref(),
            Some("https://known.example.com/i.png")
        );
        assert_eq!(source.calls(), 0);
    }
}
