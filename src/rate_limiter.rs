//! Per-domain token-bucket rate limiting.
//!
//! One bucket per `host[:port]`, created lazily with a full burst of
//! tokens. Tokens accrue linearly between consultations; callers block
//! until a token is available. Waits are interruptible through the
//! shared cancellation token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::url_processor;

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("no host in URL: {0}")]
    NoHost(String),

    #[error("rate limit wait cancelled")]
    Cancelled,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            // Start full so short bursts go through unthrottled
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Snapshot of one domain's bucket, taken without disturbing it.
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    pub domain: String,
    pub rate: f64,
    pub capacity: f64,
    pub current_tokens: f64,
    pub last_refill: Instant,
}

pub struct DomainRateLimiter {
    buckets: DashMap<String, Arc<Mutex<TokenBucket>>>,
    domain_configs: DashMap<String, f64>,
    default_rate: f64,
    max_burst: f64,
    cancel: CancellationToken,
}

impl DomainRateLimiter {
    pub fn new(default_rate: f64, max_burst: f64, cancel: CancellationToken) -> Self {
        Self {
            buckets: DashMap::new(),
            domain_configs: DashMap::new(),
            default_rate,
            max_burst,
            cancel,
        }
    }

    /// Block until a request to the URL's domain is allowed.
    pub async fn wait(&self, target_url: &str) -> Result<(), RateLimitError> {
        let domain = url_processor::domain_key(target_url)
            .ok_or_else(|| RateLimitError::NoHost(target_url.to_string()))?;

        let bucket = self.bucket(&domain);

        let wait = {
            let mut b = bucket.lock().await;
            b.refill(Instant::now());

            if b.tokens >= 1.0 {
                b.tokens -= 1.0;
                return Ok(());
            }

            if b.refill_rate <= 0.0 {
                // A non-positive rate cannot produce tokens; let the
                // request through rather than sleeping forever.
                return Ok(());
            }

            Duration::from_secs_f64((1.0 - b.tokens) / b.refill_rate)
        };

        tracing::debug!(%domain, wait_ms = wait.as_millis() as u64, "rate limiting");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = self.cancel.cancelled() => return Err(RateLimitError::Cancelled),
        }

        // We slept exactly long enough to accrue the token we consume now.
        bucket.lock().await.tokens = 0.0;
        Ok(())
    }

    /// Override the refill rate for one domain. Applies to the existing
    /// bucket and to any bucket created for the domain later.
    pub async fn update_config(&self, domain: &str, requests_per_second: f64) {
        self.domain_configs.insert(domain.to_string(), requests_per_second);

        if let Some(bucket) = self.buckets.get(domain).map(|b| Arc::clone(&b)) {
            bucket.lock().await.refill_rate = requests_per_second;
            tracing::debug!(%domain, rate = requests_per_second, "updated rate limit");
        }
    }

    /// Per-domain bucket snapshots.
    pub async fn stats(&self) -> HashMap<String, RateLimiterStats> {
        let mut stats = HashMap::new();
        let handles: Vec<(String, Arc<Mutex<TokenBucket>>)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (domain, bucket) in handles {
            let b = bucket.lock().await;
            stats.insert(
                domain.clone(),
                RateLimiterStats {
                    domain,
                    rate: b.refill_rate,
                    capacity: b.capacity,
                    current_tokens: b.tokens,
                    last_refill: b.last_refill,
                },
            );
        }

        stats
    }

    /// Drop all buckets, forgetting accumulated state.
    pub fn clear(&self) {
        self.buckets.clear();
    }

    fn bucket(&self, domain: &str) -> Arc<Mutex<TokenBucket>> {
        Arc::clone(
            &self
                .buckets
                .entry(domain.to_string())
                .or_insert_with(|| {
                    let rate = self
                        .domain_configs
                        .get(domain)
                        .map(|r| *r)
                        .unwrap_or(self.default_rate);
                    tracing::debug!(%domain, rate, burst = self.max_burst, "created rate limiter bucket");
                    Arc::new(Mutex::new(TokenBucket::new(self.max_burst, rate)))
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rate: f64, burst: f64) -> DomainRateLimiter {
        DomainRateLimiter::new(rate, burst, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_burst_passes_without_waiting() {
        let rl = limiter(1.0, 3.0);
        let start = Instant::now();
        for _ in 0..3 {
            rl.wait("https://test.local/page").await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_second_request_waits_for_refill() {
        let rl = limiter(2.0, 1.0);
        rl.wait("https://test.local/a").await.unwrap();

        let start = Instant::now();
        rl.wait("https://test.local/b").await.unwrap();
        // 2 req/s means the next token arrives after ~500 ms
        assert!(start.elapsed() >= Duration::from_millis(450));
    }

    #[tokio::test]
    async fn test_domains_have_independent_buckets() {
        let rl = limiter(1.0, 1.0);
        rl.wait("https://one.local/").await.unwrap();

        let start = Instant::now();
        rl.wait("https://two.local/").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_empty_host_is_an_error() {
        let rl = limiter(1.0, 1.0);
        assert!(matches!(
            rl.wait("not a url").await,
            Err(RateLimitError::NoHost(_))
        ));
    }

    #[tokio::test]
    async fn test_update_config_changes_existing_bucket() {
        let rl = limiter(1.0, 5.0);
        rl.wait("https://test.local/").await.unwrap();
        rl.update_config("test.local", 10.0).await;

        let stats = rl.stats().await;
        assert_eq!(stats["test.local"].rate, 10.0);
        assert_eq!(stats["test.local"].capacity, 5.0);
    }

    #[tokio::test]
    async fn test_update_config_applies_to_future_bucket() {
        let rl = limiter(1.0, 5.0);
        rl.update_config("test.local", 7.0).await;
        rl.wait("https://test.local/").await.unwrap();

        let stats = rl.stats().await;
        assert_eq!(stats["test.local"].rate, 7.0);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_wait() {
        let cancel = CancellationToken::new();
        let rl = DomainRateLimiter::new(0.01, 1.0, cancel.clone());
        rl.wait("https://test.local/").await.unwrap();

        cancel.cancel();
        assert!(matches!(
            rl.wait("https://test.local/").await,
            Err(RateLimitError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_clear_resets_buckets() {
        let rl = limiter(1.0, 1.0);
        rl.wait("https://test.local/").await.unwrap();
        assert_eq!(rl.stats().await.len(), 1);
        rl.clear();
        assert!(rl.stats().await.is_empty());
    }
}
