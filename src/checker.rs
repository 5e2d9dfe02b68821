//! Link checking with a HEAD-first probe strategy and an optional
//! caching layer.
//!
//! HEAD is attempted once per URL while the domain is not known to
//! reject it; a 405/501 (or a network failure) marks the domain
//! HEAD-unsupported and the check falls back to GET. GET responses are
//! classified by MIME type so file downloads are never read, and HTML
//! bodies are probed with a 1 KiB read to catch empty pages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::{Method, Response};
use tokio_util::sync::CancellationToken;

use crate::cache::{ttl_for_status, LinkCache};
use crate::network::{FetchError, HttpClient};
use crate::rate_limiter::{DomainRateLimiter, RateLimitError};
use crate::url_processor;

const GET_ATTEMPTS: u32 = 3;
const HEAD_ATTEMPTS: u32 = 1;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// MIME prefixes treated as file downloads: status alone decides, the
/// body is never read.
const FILE_CONTENT_TYPES: &[&str] = &[
    "application/",
    "image/",
    "video/",
    "audio/",
    "font/",
    "text/plain",
];

/// Max bytes read from an HTML body to confirm it is non-empty.
const HTML_PROBE_BYTES: usize = 1024;

#[derive(Debug, Default)]
pub struct CheckerStats {
    pub head_requests: AtomicU64,
    pub get_requests: AtomicU64,
    pub head_fallbacks: AtomicU64,
    pub bytes_saved: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckerStatsSnapshot {
    pub head_requests: u64,
    pub get_requests: u64,
    pub head_fallbacks: u64,
    pub bytes_saved: u64,
}

pub struct HttpLinkChecker {
    http: HttpClient,
    rate_limiter: Arc<DomainRateLimiter>,
    /// Per-domain memo of whether HEAD is acceptable; process-local.
    head_support: DashMap<String, bool>,
    head_enabled: bool,
    stats: CheckerStats,
    cancel: CancellationToken,
}

impl HttpLinkChecker {
    pub fn new(
        http: HttpClient,
        rate_limiter: Arc<DomainRateLimiter>,
        head_enabled: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            rate_limiter,
            head_support: DashMap::new(),
            head_enabled,
            stats: CheckerStats::default(),
            cancel,
        }
    }

    /// Check one URL, returning `(status, message)`. Transport failures
    /// after all retries come back as `(0, message)`.
    pub async fn check(&self, link_url: &str) -> (u16, String) {
        let domain = match url_processor::domain_key(link_url) {
            Some(d) => d,
            None => return (0, format!("invalid URL: {}", link_url)),
        };

        if self.head_enabled && self.should_try_head(&domain) {
            match self.try_head(link_url).await {
                HeadOutcome::Answered(status) => {
                    self.head_support.insert(domain, true);
                    self.stats.head_requests.fetch_add(1, Ordering::Relaxed);
                    return (status, String::new());
                }
                HeadOutcome::Unsupported => {
                    self.head_support.insert(domain, false);
                    self.stats.head_fallbacks.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(url = link_url, "HEAD failed, falling back to GET");
                }
            }
        }

        let result = self.get_request(link_url).await;
        self.stats.get_requests.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Fetch a URL with GET, retrying transport failures. Used by the
    /// page parser, which needs the raw response.
    pub async fn fetch_with_retry(&self, url: &str, attempts: u32) -> Result<Response, FetchError> {
        self.fetch_with_retry_method(url, attempts, Method::GET).await
    }

    async fn try_head(&self, link_url: &str) -> HeadOutcome {
        let response = match self
            .fetch_with_retry_method(link_url, HEAD_ATTEMPTS, Method::HEAD)
            .await
        {
            Ok(r) => r,
            Err(_) => return HeadOutcome::Unsupported,
        };

        let status = response.status().as_u16();
        // Method Not Allowed / Not Implemented: the server answered,
        // but not to HEAD.
        if status == 405 || status == 501 {
            return HeadOutcome::Unsupported;
        }

        HeadOutcome::Answered(status)
    }

    async fn get_request(&self, link_url: &str) -> (u16, String) {
        let response = match self
            .fetch_with_retry_method(link_url, GET_ATTEMPTS, Method::GET)
            .await
        {
            Ok(r) => r,
            Err(e) => return (0, e.to_string()),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("")
            .to_string();

        if is_file_content_type(&content_type) {
            tracing::debug!(url = link_url, %content_type, "target is a file, skipping body");
            return (status, String::new());
        }

        if content_type.contains("text/html") {
            return match self.probe_html_body(response).await {
                Ok(0) => (status, "response body is empty".to_string()),
                Ok(read) => {
                    self.stats.bytes_saved.fetch_add(read as u64, Ordering::Relaxed);
                    (status, String::new())
                }
                Err(e) => (status, format!("error reading response body: {}", e)),
            };
        }

        (status, String::new())
    }

    /// Read at most `HTML_PROBE_BYTES` of the body, returning the byte
    /// count seen. The connection is dropped without draining the rest.
    async fn probe_html_body(&self, mut response: Response) -> Result<usize, FetchError> {
        let mut read = 0;
        while read < HTML_PROBE_BYTES {
            match response.chunk().await {
                Ok(Some(chunk)) => read += chunk.len(),
                Ok(None) => break,
                Err(e) => return Err(FetchError::Body(e.to_string())),
            }
        }
        Ok(read)
    }

    async fn fetch_with_retry_method(
        &self,
        url: &str,
        attempts: u32,
        method: Method,
    ) -> Result<Response, FetchError> {
        // Politeness first; a dead limiter never blocks the check.
        match self.rate_limiter.wait(url).await {
            Ok(()) => {}
            Err(RateLimitError::Cancelled) => return Err(FetchError::Cancelled),
            Err(e) => tracing::warn!(url, error = %e, "rate limiter error, proceeding"),
        }

        let mut last_error = FetchError::Network("no attempts made".to_string());

        for attempt in 1..=attempts {
            let send = self.http.request(method.clone(), url);
            let result = tokio::select! {
                r = send => r,
                _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt < attempts {
                        tracing::warn!(
                            url,
                            attempt,
                            error = %e,
                            backoff_secs = RETRY_BACKOFF.as_secs(),
                            "request failed, retrying"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(RETRY_BACKOFF) => {}
                            _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                        }
                    }
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    fn should_try_head(&self, domain: &str) -> bool {
        // Untested domains get one shot at HEAD
        self.head_support.get(domain).map_or(true, |s| *s)
    }

    pub fn head_supported(&self, domain: &str) -> Option<bool> {
        self.head_support.get(domain).map(|s| *s)
    }

    pub fn stats(&self) -> CheckerStatsSnapshot {
        CheckerStatsSnapshot {
            head_requests: self.stats.head_requests.load(Ordering::Relaxed),
            get_requests: self.stats.get_requests.load(Ordering::Relaxed),
            head_fallbacks: self.stats.head_fallbacks.load(Ordering::Relaxed),
            bytes_saved: self.stats.bytes_saved.load(Ordering::Relaxed),
        }
    }
}

enum HeadOutcome {
    /// The server answered HEAD with this status
    Answered(u16),
    /// 405/501 or transport failure; fall back to GET
    Unsupported,
}

fn is_file_content_type(content_type: &str) -> bool {
    FILE_CONTENT_TYPES.iter().any(|t| content_type.contains(t))
}

/// Pass-through caching layer over the HTTP checker. With no cache
/// configured every call reaches the network; with one, results are
/// stored under a TTL chosen from the response status.
pub struct CachedLinkChecker {
    inner: HttpLinkChecker,
    cache: Option<LinkCache>,
}

impl CachedLinkChecker {
    pub fn new(inner: HttpLinkChecker, cache: Option<LinkCache>) -> Self {
        Self { inner, cache }
    }

    pub async fn check(&self, link_url: &str) -> (u16, String) {
        if let Some(cache) = &self.cache {
            if let Some((status, message)) = cache.get(link_url) {
                tracing::debug!(url = link_url, status, "cache hit");
                return (status, message);
            }
        }

        let (status, message) = self.inner.check(link_url).await;

        if let Some(cache) = &self.cache {
            let ttl = ttl_for_status(status, cache.default_ttl());
            cache.set_with_ttl(link_url, status, &message, ttl);
        }

        (status, message)
    }

    pub async fn fetch_with_retry(&self, url: &str, attempts: u32) -> Result<Response, FetchError> {
        self.inner.fetch_with_retry(url, attempts).await
    }

    pub fn cache_stats(&self) -> Option<crate::cache::CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    pub fn checker_stats(&self) -> CheckerStatsSnapshot {
        self.inner.stats()
    }

    pub fn head_supported(&self, domain: &str) -> Option<bool> {
        self.inner.head_supported(domain)
    }
}
