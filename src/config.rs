//! Crawl configuration. All knobs are values passed to the crawler
//! constructor; nothing is process-global.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum crawl depth; 0 checks only the seed page
    pub max_depth: u32,
    /// Worker count for the pool
    pub concurrency: usize,
    /// Skip external links entirely
    pub only_internal: bool,
    /// Regex over the full URL; empty disables the filter
    pub include_pattern: String,
    /// Regex over the full URL; empty disables the filter
    pub exclude_pattern: String,
    /// CSS selector of anchors to skip (e.g. a sidebar menu)
    pub exclude_selector: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub user_agent: String,
    /// Per-domain requests per second
    pub rate_limit: f64,
    /// Per-domain burst (token bucket capacity)
    pub rate_burst: f64,
    pub cache_enabled: bool,
    pub cache_size: usize,
    pub cache_ttl: Duration,
    /// Probe with HEAD before falling back to GET
    pub head_optimization: bool,
    /// Suppress progress output
    pub quiet: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            concurrency: 20,
            only_internal: false,
            include_pattern: String::new(),
            exclude_pattern: String::new(),
            exclude_selector: String::new(),
            timeout: Duration::from_secs(15),
            user_agent: "DeadLinkr/1.0".to_string(),
            rate_limit: 2.0,
            rate_burst: 5.0,
            cache_enabled: true,
            cache_size: 1000,
            cache_ttl: Duration::from_secs(60 * 60),
            head_optimization: true,
            quiet: false,
        }
    }
}

/// Fatal configuration problems, surfaced before the crawl starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid seed URL '{0}': no host")]
    SeedWithoutHost(String),

    #[error("invalid seed URL '{url}': {source}")]
    SeedUnparsable {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid auth spec: {0}")]
    InvalidAuth(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_surface() {
        let config = CrawlConfig::default();
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.user_agent, "DeadLinkr/1.0");
        assert_eq!(config.rate_limit, 2.0);
        assert_eq!(config.rate_burst, 5.0);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_size, 1000);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert!(config.head_optimization);
        assert!(!config.only_internal);
    }
}
