//! Graceful shutdown: signal handling, ordered cleanup hooks, and the
//! process-wide cancellation token every component selects on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);
const DEFAULT_FORCE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
#[error("shutdown error in {component}: {message}")]
pub struct ShutdownError {
    pub component: String,
    pub message: String,
}

impl ShutdownError {
    pub fn new(component: &str, message: impl std::fmt::Display) -> Self {
        Self {
            component: component.to_string(),
            message: message.to_string(),
        }
    }
}

type ShutdownHook = Box<dyn Fn() -> Result<(), ShutdownError> + Send + Sync>;

pub struct ShutdownManager {
    cancel: CancellationToken,
    is_shutting_down: AtomicBool,
    hooks: Mutex<Vec<ShutdownHook>>,
    completed_tx: watch::Sender<bool>,
    completed_rx: watch::Receiver<bool>,
    grace_period: Duration,
    force_timeout: Duration,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_GRACE_PERIOD, DEFAULT_FORCE_TIMEOUT)
    }

    pub fn with_timeouts(grace_period: Duration, force_timeout: Duration) -> Self {
        let (completed_tx, completed_rx) = watch::channel(false);
        Self {
            cancel: CancellationToken::new(),
            is_shutting_down: AtomicBool::new(false),
            hooks: Mutex::new(Vec::new()),
            completed_tx,
            completed_rx,
            grace_period,
            force_timeout,
        }
    }

    /// The shared cancellation token. Clones observe the same state.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    /// Register a cleanup hook. Hooks run in registration order; a
    /// failing hook is logged and does not stop the rest.
    pub fn add_hook(&self, hook: impl Fn() -> Result<(), ShutdownError> + Send + Sync + 'static) {
        self.hooks.lock().push(Box::new(hook));
    }

    /// Listen for SIGINT/SIGTERM and initiate shutdown on the first one.
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("received shutdown signal");
            manager.initiate();
        });
    }

    /// Begin the shutdown sequence. Idempotent: later calls are no-ops.
    pub fn initiate(self: &Arc<Self>) {
        if self.is_shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("initiating graceful shutdown");

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.perform_shutdown().await;
        });
    }

    async fn perform_shutdown(self: Arc<Self>) {
        let hook_runner = Arc::clone(&self);
        let hooks = tokio::task::spawn_blocking(move || hook_runner.run_hooks());

        match tokio::time::timeout(self.grace_period, hooks).await {
            Ok(_) => tracing::info!("all shutdown hooks completed"),
            Err(_) => tracing::warn!("shutdown hooks timed out, forcing shutdown"),
        }

        // Signal every component; in-flight work observes this token.
        self.cancel.cancel();

        tokio::select! {
            _ = tokio::time::sleep(self.force_timeout) => {
                tracing::warn!("force shutdown timeout reached");
            }
            _ = self.cancel.cancelled() => {}
        }

        tracing::info!("shutdown completed");
        let _ = self.completed_tx.send(true);
    }

    fn run_hooks(&self) {
        let hooks = self.hooks.lock();
        tracing::info!(count = hooks.len(), "executing shutdown hooks");

        for (i, hook) in hooks.iter().enumerate() {
            match hook() {
                Ok(()) => tracing::debug!(hook = i + 1, "shutdown hook completed"),
                Err(e) => tracing::error!(hook = i + 1, error = %e, "shutdown hook failed"),
            }
        }
    }

    /// Block until the shutdown sequence has finished.
    pub async fn wait_for_completion(&self) {
        let mut rx = self.completed_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
