pub mod auth;
pub mod cache;
pub mod checker;
pub mod cli;
pub mod collector;
pub mod config;
pub mod crawler;
pub mod logging;
pub mod models;
pub mod network;
pub mod parser;
pub mod progress;
pub mod rate_limiter;
pub mod report;
pub mod shutdown;
pub mod url_processor;
pub mod worker_pool;

// Re-export main types for library usage
pub use auth::AuthConfig;
pub use cache::{CacheStats, LinkCache};
pub use checker::{CachedLinkChecker, HttpLinkChecker};
pub use collector::ResultCollector;
pub use config::{ConfigError, CrawlConfig};
pub use crawler::{CrawlError, CrawlState, Crawler};
pub use models::LinkResult;
pub use network::{FetchError, HttpClient};
pub use rate_limiter::DomainRateLimiter;
pub use shutdown::ShutdownManager;
pub use worker_pool::{Job, WorkerPool};
