//! URL resolution, filtering, and classification helpers used by the
//! parser, the rate limiter, and the crawler.

use regex::Regex;
use url::Url;

use crate::config::ConfigError;

/// Resolves hrefs against page URLs and applies the configured
/// include/exclude filters. Patterns are compiled once at construction;
/// a malformed pattern is a fatal config error.
#[derive(Debug)]
pub struct UrlProcessor {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl UrlProcessor {
    pub fn new(include_pattern: &str, exclude_pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_pattern(include_pattern)?,
            exclude: compile_pattern(exclude_pattern)?,
        })
    }

    /// Resolve an href against the page it appeared on.
    ///
    /// Empty and pure-fragment hrefs are the caller's problem; they
    /// must be filtered before resolution.
    pub fn resolve(&self, page_url: &str, href: &str) -> Result<Url, url::ParseError> {
        let page = Url::parse(page_url)?;
        page.join(href)
    }

    /// True when the candidate should not be checked at all: non-HTTP
    /// scheme, missing from the include pattern, or matching the
    /// exclude pattern. Exclude takes precedence over include.
    pub fn should_skip(&self, candidate: &Url) -> bool {
        if !matches!(candidate.scheme(), "http" | "https") {
            return true;
        }

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(candidate.as_str()) {
                return true;
            }
        }

        if let Some(include) = &self.include {
            if !include.is_match(candidate.as_str()) {
                return true;
            }
        }

        false
    }

    /// Parse and validate a seed URL. A seed without a host cannot
    /// anchor the internal/external classification.
    pub fn validate_seed(&self, seed: &str) -> Result<Url, ConfigError> {
        let parsed = Url::parse(seed).map_err(|source| ConfigError::SeedUnparsable {
            url: seed.to_string(),
            source,
        })?;

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::SeedWithoutHost(seed.to_string()));
        }

        Ok(parsed)
    }
}

/// Internal vs external is decided by host equality with the seed.
pub fn is_external(seed: &Url, candidate: &Url) -> bool {
    seed.host_str() != candidate.host_str()
}

/// Rate-limiting key for a URL: `host` or `host:port` when an explicit
/// port survives parsing.
pub fn domain_key(target_url: &str) -> Option<String> {
    let parsed = Url::parse(target_url).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    match parsed.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host.to_string()),
    }
}

fn compile_pattern(pattern: &str) -> Result<Option<Regex>, ConfigError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|source| ConfigError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })
}
