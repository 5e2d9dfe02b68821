//! Page fetching, HTML parsing, and per-anchor link checking.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{Html, Selector};
use url::Url;

use crate::checker::CachedLinkChecker;
use crate::models::LinkResult;
use crate::network::FetchError;
use crate::url_processor::{self, UrlProcessor};

const PAGE_FETCH_ATTEMPTS: u32 = 3;

/// Anchors pulled out of a fetched page, in DOM order, already reduced
/// by the CSS exclusion selector.
#[derive(Debug)]
pub struct PageDocument {
    pub hrefs: Vec<String>,
}

pub struct PageParser {
    checker: Arc<CachedLinkChecker>,
    processor: Arc<UrlProcessor>,
    exclude_selector: String,
    only_internal: bool,
}

impl PageParser {
    pub fn new(
        checker: Arc<CachedLinkChecker>,
        processor: Arc<UrlProcessor>,
        exclude_selector: String,
        only_internal: bool,
    ) -> Self {
        Self {
            checker,
            processor,
            exclude_selector,
            only_internal,
        }
    }

    /// Fetch a page and pull its anchors. `Ok(None)` means the URL
    /// serves something other than HTML and yields no links.
    pub async fn parse(&self, page_url: &str) -> Result<Option<PageDocument>, FetchError> {
        let response = self
            .checker
            .fetch_with_retry(page_url, PAGE_FETCH_ATTEMPTS)
            .await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        if !content_type.contains("text/html") {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        // scraper's DOM is not Send; parse on the blocking pool and
        // hand back plain strings.
        let exclude = self.exclude_selector.clone();
        let hrefs = tokio::task::spawn_blocking(move || collect_hrefs(&body, &exclude))
            .await
            .map_err(|e| FetchError::Body(format!("HTML parse task failed: {}", e)))?;

        Ok(Some(PageDocument { hrefs }))
    }

    /// Resolve, filter, classify, and check every anchor. Filtered
    /// anchors are omitted entirely; the same URL linked twice on one
    /// page yields two results.
    pub async fn extract_links(
        &self,
        seed: &Url,
        page_url: &str,
        document: &PageDocument,
    ) -> Vec<LinkResult> {
        let mut page_links = Vec::new();

        for href in &document.hrefs {
            if href.is_empty() || href.starts_with('#') {
                continue;
            }

            let link = match self.processor.resolve(page_url, href) {
                Ok(link) => link,
                Err(e) => {
                    tracing::debug!(href, error = %e, "skipping unresolvable href");
                    continue;
                }
            };

            if self.processor.should_skip(&link) {
                continue;
            }

            let is_external = url_processor::is_external(seed, &link);
            if self.only_internal && is_external {
                continue;
            }

            let (status, error) = self.checker.check(link.as_str()).await;

            page_links.push(LinkResult {
                source_url: page_url.to_string(),
                target_url: link.into(),
                status,
                error,
                is_external,
            });
        }

        page_links
    }
}

/// Select `body a[href]` minus anchors matched by the exclusion
/// selector. An invalid exclusion selector is ignored with a warning.
fn collect_hrefs(html: &str, exclude_selector: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("body a[href]").unwrap();

    let excluded: HashSet<_> = if exclude_selector.is_empty() {
        HashSet::new()
    } else {
        match Selector::parse(exclude_selector) {
            Ok(selector) => document.select(&selector).map(|el| el.id()).collect(),
            Err(_) => {
                tracing::warn!(selector = exclude_selector, "invalid exclusion selector, ignoring");
                HashSet::new()
            }
        }
    };

    document
        .select(&anchors)
        .filter(|el| !excluded.contains(&el.id()))
        .filter_map(|el| el.value().attr("href").map(str::to_string))
        .collect()
}
