use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::CrawlConfig;

/// deadlinkr cli
#[derive(Parser)]
#[command(name = "deadlinkr")]
#[command(about = "Check a website for broken links")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl a whole site and check every link
    Scan {
        /// The seed URL to start crawling from
        url: String,

        #[command(flatten)]
        opts: CrawlOpts,
    },

    /// Check the links on a single page, without recursion
    Check {
        /// The page URL to check
        url: String,

        #[command(flatten)]
        opts: CrawlOpts,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct CrawlOpts {
    /// Maximum crawl depth (0 = only the seed page)
    #[arg(long, default_value_t = 1)]
    pub depth: u32,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 20)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub timeout: u64,

    /// Check only internal links
    #[arg(long)]
    pub only_internal: bool,

    /// Report only external links
    #[arg(long, conflicts_with = "only_internal")]
    pub only_external: bool,

    /// User agent for requests
    #[arg(long, default_value = "DeadLinkr/1.0")]
    pub user_agent: String,

    /// Only check URLs matching this regex
    #[arg(long, default_value = "")]
    pub include_pattern: String,

    /// Skip URLs matching this regex
    #[arg(long, default_value = "")]
    pub exclude_pattern: String,

    /// CSS selector of anchors to skip (e.g. "div.md-sidebar__scrollwrap a[href]")
    #[arg(long = "exclude-html-tags", default_value = "")]
    pub exclude_html_tags: String,

    /// Per-domain requests per second
    #[arg(long, default_value_t = 2.0)]
    pub rate_limit: f64,

    /// Per-domain burst allowance
    #[arg(long, default_value_t = 5.0)]
    pub rate_burst: f64,

    /// Probe links with HEAD before falling back to GET
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub optimize_head: bool,

    /// Cache link check results
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub cache: bool,

    /// Maximum number of cached results
    #[arg(long, default_value_t = 1000)]
    pub cache_size: usize,

    /// Cache TTL in minutes
    #[arg(long, default_value_t = 60)]
    pub cache_ttl: u64,

    /// Output file path (csv, json, or html)
    #[arg(long, default_value = "")]
    pub output: String,

    /// Export format: csv, json, or html (inferred from --output extension when empty)
    #[arg(long, default_value = "")]
    pub format: String,

    /// Include non-broken links in the report
    #[arg(long)]
    pub show_all: bool,

    /// Suppress progress and log output
    #[arg(long)]
    pub quiet: bool,

    /// Log level (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Basic auth credentials as user:password
    #[arg(long, default_value = "")]
    pub auth_basic: String,

    /// Bearer token for Authorization header
    #[arg(long, default_value = "")]
    pub auth_bearer: String,

    /// Custom header as 'Key: Value' (repeatable)
    #[arg(long = "auth-header")]
    pub auth_header: Vec<String>,

    /// Cookie header value
    #[arg(long, default_value = "")]
    pub auth_cookies: String,
}

impl CrawlOpts {
    /// Build the crawl configuration. `single_page` pins the depth to
    /// zero for the `check` command.
    pub fn to_config(&self, single_page: bool) -> CrawlConfig {
        CrawlConfig {
            max_depth: if single_page { 0 } else { self.depth },
            concurrency: self.concurrency.max(1),
            only_internal: self.only_internal,
            include_pattern: self.include_pattern.clone(),
            exclude_pattern: self.exclude_pattern.clone(),
            exclude_selector: self.exclude_html_tags.clone(),
            timeout: Duration::from_secs(self.timeout),
            user_agent: self.user_agent.clone(),
            rate_limit: self.rate_limit,
            rate_burst: self.rate_burst,
            cache_enabled: self.cache,
            cache_size: self.cache_size,
            cache_ttl: Duration::from_secs(self.cache_ttl * 60),
            head_optimization: self.optimize_head,
            quiet: self.quiet,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
