//! Tracing subscriber setup driven by the CLI log level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging. `RUST_LOG` wins when set; otherwise the CLI
/// level applies. Quiet mode only surfaces errors. Safe to call more
/// than once (later calls are no-ops), which keeps tests simple.
pub fn init_logging(level: &str, quiet: bool) {
    let default_directive = if quiet { "error" } else { level };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}
