//! Fixed-size worker pool draining a bounded job queue.
//!
//! Workers share one MPMC receiver and exit when the queue closes or
//! the cancellation token fires. Submission never blocks: a full queue
//! drops the job with a warning.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collector::ResultCollector;
use crate::crawler::CrawlError;
use crate::models::LinkResult;
use crate::parser::PageParser;
use crate::progress::ProgressTracker;
use crate::url_processor::UrlProcessor;

pub type JobCallback = Box<dyn FnOnce(Vec<LinkResult>, Option<CrawlError>) + Send + 'static>;

/// One unit of work: fetch `target_url`, check its anchors, report
/// back. Consumed exactly once by one worker.
pub struct Job {
    pub base_url: String,
    pub target_url: String,
    pub depth: u32,
    pub on_complete: Option<JobCallback>,
}

#[derive(Debug, Default)]
pub struct PoolStats {
    pub jobs_queued: AtomicU64,
    pub jobs_active: AtomicI64,
    pub jobs_completed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub jobs_queued: u64,
    pub jobs_active: i64,
    pub jobs_completed: u64,
}

/// Shared services each worker needs to process a job.
pub struct WorkerContext {
    pub parser: Arc<PageParser>,
    pub processor: Arc<UrlProcessor>,
    pub collector: Arc<ResultCollector>,
}

pub struct WorkerPool {
    workers: usize,
    job_tx: Mutex<Option<flume::Sender<Job>>>,
    job_rx: flume::Receiver<Job>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    cancel: CancellationToken,
    ctx: Arc<WorkerContext>,
    stats: Arc<PoolStats>,
    progress: Mutex<Option<Arc<ProgressTracker>>>,
}

impl WorkerPool {
    pub fn new(workers: usize, ctx: WorkerContext, cancel: CancellationToken) -> Self {
        // Small buffer over the worker count keeps the flow smooth
        // without hoarding jobs the orchestrator could still reorder.
        let (job_tx, job_rx) = flume::bounded(workers * 2);

        Self {
            workers,
            job_tx: Mutex::new(Some(job_tx)),
            job_rx,
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            cancel,
            ctx: Arc::new(ctx),
            stats: Arc::new(PoolStats::default()),
            progress: Mutex::new(None),
        }
    }

    pub fn set_progress_tracker(&self, tracker: Arc<ProgressTracker>) {
        *self.progress.lock() = Some(tracker);
    }

    /// Spawn the workers. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!(workers = self.workers, "starting worker pool");

        let mut handles = self.handles.lock();
        for id in 0..self.workers {
            let rx = self.job_rx.clone();
            let cancel = self.cancel.clone();
            let ctx = Arc::clone(&self.ctx);
            let stats = Arc::clone(&self.stats);
            let progress = self.progress.lock().clone();

            handles.push(tokio::spawn(async move {
                worker_loop(id, rx, cancel, ctx, stats, progress).await;
            }));
        }
    }

    /// Queue a job. Returns false when the pool is cancelled, the queue
    /// is closed, or the queue is full (the job is then dropped).
    pub fn submit(&self, job: Job) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let guard = self.job_tx.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };

        match tx.try_send(job) {
            Ok(()) => {
                self.stats.jobs_queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(flume::TrySendError::Full(job)) => {
                tracing::warn!(target_url = %job.target_url, "job queue full, dropping job");
                false
            }
            Err(flume::TrySendError::Disconnected(_)) => false,
        }
    }

    /// Close the queue and wait for the workers to drain it.
    pub async fn stop(&self) {
        tracing::debug!("stopping worker pool");
        self.close_queue();
        self.join_workers().await;
        tracing::debug!("worker pool stopped");
    }

    /// Cancel immediately. Workers observe the token at their next
    /// suspension point; the caller joins them separately if it cares.
    pub fn force_stop(&self) {
        tracing::debug!("force stopping worker pool");
        self.cancel.cancel();
        self.close_queue();
    }

    /// Await worker task exit. Used after `force_stop` so the crawler
    /// can guarantee all workers are joined before reporting done.
    pub async fn join_workers(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "worker panicked");
                }
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.stats.jobs_active.load(Ordering::Relaxed) == 0 && self.job_rx.is_empty()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            jobs_queued: self.stats.jobs_queued.load(Ordering::Relaxed),
            jobs_active: self.stats.jobs_active.load(Ordering::Relaxed),
            jobs_completed: self.stats.jobs_completed.load(Ordering::Relaxed),
        }
    }

    fn close_queue(&self) {
        self.job_tx.lock().take();
    }
}

async fn worker_loop(
    id: usize,
    rx: flume::Receiver<Job>,
    cancel: CancellationToken,
    ctx: Arc<WorkerContext>,
    stats: Arc<PoolStats>,
    progress: Option<Arc<ProgressTracker>>,
) {
    tracing::debug!(worker = id, "worker started");

    loop {
        let job = tokio::select! {
            job = rx.recv_async() => match job {
                Ok(job) => job,
                Err(_) => {
                    tracing::debug!(worker = id, "worker stopping, queue closed");
                    return;
                }
            },
            _ = cancel.cancelled() => {
                tracing::debug!(worker = id, "worker cancelled");
                return;
            }
        };

        stats.jobs_active.fetch_add(1, Ordering::Relaxed);
        process_job(id, job, &ctx).await;
        stats.jobs_active.fetch_sub(1, Ordering::Relaxed);
        stats.jobs_completed.fetch_add(1, Ordering::Relaxed);

        if let Some(tracker) = &progress {
            tracker.increment_completed();
        }
    }
}

async fn process_job(worker_id: usize, job: Job, ctx: &WorkerContext) {
    let start = std::time::Instant::now();
    tracing::debug!(worker = worker_id, url = %job.target_url, depth = job.depth, "processing job");

    // Test-and-set guards against two workers fetching the same page.
    if !ctx.collector.mark_visited(&job.target_url) {
        tracing::debug!(worker = worker_id, url = %job.target_url, "already visited, skipping");
        complete(job.on_complete, Vec::new(), None);
        return;
    }

    let seed = match ctx.processor.validate_seed(&job.base_url) {
        Ok(seed) => seed,
        Err(e) => {
            tracing::error!(worker = worker_id, base_url = %job.base_url, error = %e, "invalid base URL");
            complete(job.on_complete, Vec::new(), Some(CrawlError::Config(e)));
            return;
        }
    };

    let document = match ctx.parser.parse(&job.target_url).await {
        Ok(Some(document)) => document,
        Ok(None) => {
            tracing::debug!(worker = worker_id, url = %job.target_url, "no HTML content");
            complete(job.on_complete, Vec::new(), None);
            return;
        }
        Err(e) => {
            tracing::error!(worker = worker_id, url = %job.target_url, error = %e, "failed to fetch page");
            complete(job.on_complete, Vec::new(), Some(CrawlError::Fetch(e)));
            return;
        }
    };

    let links = ctx
        .parser
        .extract_links(&seed, &job.target_url, &document)
        .await;

    for link in &links {
        ctx.collector.add_result(link.clone());
    }

    tracing::debug!(
        worker = worker_id,
        url = %job.target_url,
        links = links.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "job completed"
    );

    complete(job.on_complete, links, None);
}

fn complete(callback: Option<JobCallback>, links: Vec<LinkResult>, err: Option<CrawlError>) {
    if let Some(cb) = callback {
        cb(links, err);
    }
}
