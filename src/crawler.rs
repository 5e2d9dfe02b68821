//! Crawl orchestration.
//!
//! The crawler seeds the worker pool, receives per-job completions,
//! and owns all follow-up scheduling: internal links below the depth
//! limit become new jobs, everything else stops at its `LinkResult`.
//! Quiescence is detected by an active-jobs count reaching zero while
//! the pool reports an empty queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::auth::AuthConfig;
use crate::cache::LinkCache;
use crate::checker::{CachedLinkChecker, HttpLinkChecker};
use crate::collector::ResultCollector;
use crate::config::{ConfigError, CrawlConfig};
use crate::models::LinkResult;
use crate::network::{FetchError, HttpClient};
use crate::parser::PageParser;
use crate::progress::ProgressTracker;
use crate::rate_limiter::DomainRateLimiter;
use crate::shutdown::ShutdownManager;
use crate::url_processor::UrlProcessor;
use crate::worker_pool::{Job, PoolStatsSnapshot, WorkerContext, WorkerPool};

const QUIESCENCE_POLL: Duration = Duration::from_millis(100);
const PROGRESS_REFRESH: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to submit job for {0}")]
    Submit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Created,
    Running,
    Draining,
    Stopping,
    Done,
}

/// What a finished job reports back to the orchestrator.
struct Completion {
    depth: u32,
    links: Vec<LinkResult>,
    failed: bool,
}

pub struct Crawler {
    config: CrawlConfig,
    pool: Arc<WorkerPool>,
    collector: Arc<ResultCollector>,
    checker: Arc<CachedLinkChecker>,
    processor: Arc<UrlProcessor>,
    shutdown: Arc<ShutdownManager>,
    progress: Arc<ProgressTracker>,
    state: Mutex<CrawlState>,
}

impl Crawler {
    pub fn new(config: CrawlConfig, auth: AuthConfig) -> Result<Self, CrawlError> {
        Self::with_shutdown(config, auth, Arc::new(ShutdownManager::new()))
    }

    /// Construct with a caller-provided shutdown manager. All mutable
    /// run state lives inside this instance; nothing is global.
    pub fn with_shutdown(
        config: CrawlConfig,
        auth: AuthConfig,
        shutdown: Arc<ShutdownManager>,
    ) -> Result<Self, CrawlError> {
        let cancel = shutdown.token();

        let http = HttpClient::new(&config.user_agent, config.timeout, auth)?;
        let rate_limiter = Arc::new(DomainRateLimiter::new(
            config.rate_limit,
            config.rate_burst,
            cancel.clone(),
        ));

        let cache = config
            .cache_enabled
            .then(|| LinkCache::new(config.cache_ttl, config.cache_size));

        let checker = Arc::new(CachedLinkChecker::new(
            HttpLinkChecker::new(http, rate_limiter, config.head_optimization, cancel.clone()),
            cache,
        ));

        let processor = Arc::new(UrlProcessor::new(
            &config.include_pattern,
            &config.exclude_pattern,
        )?);
        let collector = Arc::new(ResultCollector::new());
        let parser = Arc::new(PageParser::new(
            Arc::clone(&checker),
            Arc::clone(&processor),
            config.exclude_selector.clone(),
            config.only_internal,
        ));

        let pool = Arc::new(WorkerPool::new(
            config.concurrency,
            WorkerContext {
                parser,
                processor: Arc::clone(&processor),
                collector: Arc::clone(&collector),
            },
            cancel,
        ));

        let progress = Arc::new(ProgressTracker::new(!config.quiet));
        pool.set_progress_tracker(Arc::clone(&progress));

        let crawler = Self {
            config,
            pool,
            collector,
            checker,
            processor,
            shutdown,
            progress,
            state: Mutex::new(CrawlState::Created),
        };
        crawler.register_shutdown_hooks();

        Ok(crawler)
    }

    pub fn shutdown_manager(&self) -> Arc<ShutdownManager> {
        Arc::clone(&self.shutdown)
    }

    pub fn state(&self) -> CrawlState {
        *self.state.lock()
    }

    pub fn get_results(&self) -> Vec<LinkResult> {
        self.collector.get_results()
    }

    pub fn count_broken(&self) -> usize {
        self.collector.count_broken()
    }

    pub fn pool_stats(&self) -> PoolStatsSnapshot {
        self.pool.stats()
    }

    pub fn checker(&self) -> &CachedLinkChecker {
        &self.checker
    }

    /// Crawl from the seed and return a snapshot of every result.
    ///
    /// Returns early with a config error for an invalid seed; per-link
    /// and per-page failures are recorded as results, never raised.
    #[tracing::instrument(skip(self), fields(seed = seed_url, max_depth = self.config.max_depth))]
    pub async fn run(&self, seed_url: &str) -> Result<Vec<LinkResult>, CrawlError> {
        let seed = self.processor.validate_seed(seed_url)?;
        let seed_url = seed.to_string();

        *self.state.lock() = CrawlState::Running;
        self.pool.start();
        tracing::info!(concurrency = self.config.concurrency, "crawl started");

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let active = Arc::new(AtomicU64::new(0));

        if !self.submit_job(&seed_url, &seed_url, 0, &done_tx, &active) {
            *self.state.lock() = CrawlState::Done;
            return Err(CrawlError::Submit(seed_url));
        }

        let cancel = self.shutdown.token();
        let mut poll = tokio::time::interval(QUIESCENCE_POLL);
        let mut last_render = std::time::Instant::now();
        let mut cancelled = false;

        loop {
            tokio::select! {
                Some(completion) = done_rx.recv() => {
                    self.handle_completion(completion, &seed_url, &done_tx, &active);
                }

                _ = poll.tick() => {
                    if active.load(Ordering::SeqCst) == 0 {
                        *self.state.lock() = CrawlState::Draining;
                        if self.pool.is_idle() {
                            break;
                        }
                    }

                    if last_render.elapsed() >= PROGRESS_REFRESH {
                        self.update_progress();
                        last_render = std::time::Instant::now();
                    }
                }

                _ = cancel.cancelled() => {
                    tracing::info!("crawl interrupted by shutdown signal");
                    *self.state.lock() = CrawlState::Stopping;
                    self.pool.force_stop();
                    cancelled = true;
                    break;
                }
            }
        }

        if cancelled {
            // Workers notice the token at their next suspension point;
            // join them so the snapshot below is final.
            self.pool.join_workers().await;
        } else {
            self.pool.stop().await;
        }

        self.update_progress();
        self.progress.finish();
        *self.state.lock() = CrawlState::Done;

        let results = self.collector.get_results();
        tracing::info!(
            links = results.len(),
            broken = self.collector.count_broken(),
            "crawl finished"
        );

        Ok(results)
    }

    /// Schedule follow-up jobs for a completed page and settle its slot
    /// in the active-jobs count.
    fn handle_completion(
        &self,
        completion: Completion,
        seed_url: &str,
        done_tx: &mpsc::UnboundedSender<Completion>,
        active: &Arc<AtomicU64>,
    ) {
        if completion.failed {
            self.progress.increment_error();
        }

        // Children sit at depth + 1; never create jobs past the limit.
        if completion.depth < self.config.max_depth {
            for link in &completion.links {
                if link.is_external {
                    continue;
                }
                if self.collector.is_visited(&link.target_url) {
                    continue;
                }
                self.submit_job(seed_url, &link.target_url, completion.depth + 1, done_tx, active);
            }
        }

        active.fetch_sub(1, Ordering::SeqCst);
    }

    fn submit_job(
        &self,
        base_url: &str,
        target_url: &str,
        depth: u32,
        done_tx: &mpsc::UnboundedSender<Completion>,
        active: &Arc<AtomicU64>,
    ) -> bool {
        active.fetch_add(1, Ordering::SeqCst);

        let tx = done_tx.clone();
        let job = Job {
            base_url: base_url.to_string(),
            target_url: target_url.to_string(),
            depth,
            on_complete: Some(Box::new(move |links, err| {
                let _ = tx.send(Completion {
                    depth,
                    links,
                    failed: err.is_some(),
                });
            })),
        };

        if self.pool.submit(job) {
            true
        } else {
            active.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    fn update_progress(&self) {
        if !self.progress.is_enabled() {
            return;
        }

        let pool_stats = self.pool.stats();
        self.progress.set_total(pool_stats.jobs_queued);
        self.progress.set_active(pool_stats.jobs_active);

        if let Some(cache_stats) = self.checker.cache_stats() {
            self.progress.update_cache_stats(cache_stats.hits, cache_stats.misses);
        }
        let checker_stats = self.checker.checker_stats();
        self.progress.update_bandwidth_stats(
            checker_stats.bytes_saved,
            checker_stats.head_requests,
            checker_stats.get_requests,
        );

        self.progress.render();
    }

    fn register_shutdown_hooks(&self) {
        let pool = Arc::clone(&self.pool);
        self.shutdown.add_hook(move || {
            tracing::debug!("shutdown hook: stopping worker pool");
            pool.force_stop();
            Ok(())
        });

        let progress = Arc::clone(&self.progress);
        self.shutdown.add_hook(move || {
            tracing::debug!("shutdown hook: finishing progress tracker");
            progress.finish();
            Ok(())
        });

        let collector = Arc::clone(&self.collector);
        self.shutdown.add_hook(move || {
            let results = collector.get_results();
            tracing::info!(
                links = results.len(),
                broken = collector.count_broken(),
                "shutdown hook: final results"
            );
            Ok(())
        });
    }
}
