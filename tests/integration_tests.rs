//! End-to-end crawl scenarios against mock HTTP servers.
//!
//! Result ordering across workers is completion order, so every
//! assertion over collections sorts first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deadlinkr::auth::AuthConfig;
use deadlinkr::checker::{CachedLinkChecker, HttpLinkChecker};
use deadlinkr::cache::LinkCache;
use deadlinkr::config::CrawlConfig;
use deadlinkr::crawler::{CrawlState, Crawler};
use deadlinkr::network::HttpClient;
use deadlinkr::rate_limiter::DomainRateLimiter;
use deadlinkr::shutdown::ShutdownManager;

/// Fast, deterministic config: no cache, no HEAD probing, effectively
/// no rate limiting.
fn test_config() -> CrawlConfig {
    CrawlConfig {
        concurrency: 4,
        timeout: Duration::from_secs(5),
        rate_limit: 1000.0,
        rate_burst: 1000.0,
        cache_enabled: false,
        head_optimization: false,
        quiet: true,
        ..CrawlConfig::default()
    }
}

fn html_page(hrefs: &[&str]) -> String {
    let anchors: String = hrefs
        .iter()
        .map(|href| format!("<a href=\"{}\">link</a>\n", href))
        .collect();
    format!("<html><body>\n{}</body></html>", anchors)
}

async fn mount_page(server: &MockServer, route: &str, hrefs: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html_page(hrefs))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Sorted (source, target, status) triples for set-style comparison.
fn triples(results: &[deadlinkr::models::LinkResult]) -> Vec<(String, String, u16)> {
    let mut out: Vec<_> = results
        .iter()
        .map(|r| (r.source_url.clone(), r.target_url.clone(), r.status))
        .collect();
    out.sort();
    out
}

#[tokio::test]
async fn test_broken_link_discovery() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", &["/ok", "/gone"]).await;
    mount_page(&server, "/ok", &[]).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config(), AuthConfig::default()).unwrap();
    let results = crawler.run(&base).await.unwrap();

    let mut expected = vec![
        (format!("{}/", base), format!("{}/ok", base), 200),
        (format!("{}/", base), format!("{}/gone", base), 404),
    ];
    expected.sort();

    assert_eq!(triples(&results), expected);
    assert_eq!(crawler.count_broken(), 1);
    assert_eq!(crawler.state(), CrawlState::Done);
}

#[tokio::test]
async fn test_depth_limit_stops_the_chain() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", &["/a"]).await;
    mount_page(&server, "/a", &["/b"]).await;
    mount_page(&server, "/b", &["/c"]).await;
    // With depth 1, /b is checked as a link but never parsed, so /c
    // must never be requested at all.
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config(), AuthConfig::default()).unwrap();
    let results = crawler.run(&base).await.unwrap();

    let mut expected = vec![
        (format!("{}/", base), format!("{}/a", base), 200),
        (format!("{}/a", base), format!("{}/b", base), 200),
    ];
    expected.sort();

    assert_eq!(triples(&results), expected);
    assert!(results.iter().all(|r| r.source_url != format!("{}/b", base)));
}

#[tokio::test]
async fn test_cycle_pages_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", &["/x"]).await;
    mount_page(&server, "/x", &["/"]).await;

    let config = CrawlConfig {
        max_depth: 5,
        ..test_config()
    };
    let crawler = Crawler::new(config, AuthConfig::default()).unwrap();
    let results = crawler.run(&base).await.unwrap();

    // One result per edge of the cycle; a second parse of either page
    // would duplicate an entry.
    let mut expected = vec![
        (format!("{}/", base), format!("{}/x", base), 200),
        (format!("{}/x", base), format!("{}/", base), 200),
    ];
    expected.sort();

    assert_eq!(triples(&results), expected);
}

#[tokio::test]
async fn test_filtered_links_are_omitted() {
    let server = MockServer::start().await;
    let base = server.uri();
    let port = server.address().port();

    // localhost resolves to the same server but is a different host
    // string, so it classifies as external.
    let external = format!("http://localhost:{}/ext", port);
    mount_page(
        &server,
        "/",
        &[
            "/ok",
            "mailto:someone@test.local",
            "/secret/hidden",
            &external,
            "#fragment",
            "",
        ],
    )
    .await;
    mount_page(&server, "/ok", &[]).await;
    mount_page(&server, "/ext", &[]).await;

    let config = CrawlConfig {
        max_depth: 0,
        only_internal: true,
        exclude_pattern: "/secret/".to_string(),
        ..test_config()
    };
    let crawler = Crawler::new(config, AuthConfig::default()).unwrap();
    let results = crawler.run(&base).await.unwrap();

    // Scheme-filtered, pattern-excluded, external, fragment, and empty
    // hrefs all vanish without a sentinel record.
    assert_eq!(
        triples(&results),
        vec![(format!("{}/", base), format!("{}/ok", base), 200)]
    );
}

#[tokio::test]
async fn test_external_links_are_classified_and_checked() {
    let server = MockServer::start().await;
    let base = server.uri();
    let port = server.address().port();

    let external = format!("http://localhost:{}/ext", port);
    mount_page(&server, "/", &[&external]).await;
    mount_page(&server, "/ext", &[]).await;

    let config = CrawlConfig {
        max_depth: 3,
        ..test_config()
    };
    let crawler = Crawler::new(config, AuthConfig::default()).unwrap();
    let results = crawler.run(&base).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].is_external);
    assert_eq!(results[0].status, 200);
    // External pages are checked, never crawled into: with localhost as
    // its own host, /ext would have been parsed and re-listed otherwise.
    assert!(results.iter().all(|r| !r.source_url.contains("localhost")));
}

#[tokio::test]
async fn test_exclusion_selector_skips_sidebar_anchors() {
    let server = MockServer::start().await;
    let base = server.uri();

    let body = r#"<html><body>
        <div class="md-sidebar__scrollwrap">
            <a href="/menu">menu</a>
        </div>
        <a href="/content">content</a>
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/content", &[]).await;

    let config = CrawlConfig {
        max_depth: 0,
        exclude_selector: "div.md-sidebar__scrollwrap a[href]".to_string(),
        ..test_config()
    };
    let crawler = Crawler::new(config, AuthConfig::default()).unwrap();
    let results = crawler.run(&base).await.unwrap();

    assert_eq!(
        triples(&results),
        vec![(format!("{}/", base), format!("{}/content", base), 200)]
    );
}

fn standalone_checker(
    base_rate: f64,
    burst: f64,
    head_enabled: bool,
    cache: Option<LinkCache>,
) -> CachedLinkChecker {
    let cancel = CancellationToken::new();
    let http = HttpClient::new("DeadLinkr/1.0", Duration::from_secs(5), AuthConfig::default()).unwrap();
    let limiter = Arc::new(DomainRateLimiter::new(base_rate, burst, cancel.clone()));
    CachedLinkChecker::new(HttpLinkChecker::new(http, limiter, head_enabled, cancel), cache)
}

#[tokio::test]
async fn test_head_fallback_marks_domain_unsupported() {
    let server = MockServer::start().await;
    let base = server.uri();
    let domain = format!("127.0.0.1:{}", server.address().port());

    Mock::given(method("HEAD"))
        .and(path("/legacy"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    mount_page(&server, "/legacy", &[]).await;

    // After the fallback, HEAD must never be issued to this domain again
    Mock::given(method("HEAD"))
        .and(path("/other"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/other", &[]).await;

    let checker = standalone_checker(1000.0, 1000.0, true, None);

    let (status, error) = checker.check(&format!("{}/legacy", base)).await;
    assert_eq!((status, error.as_str()), (200, ""));
    assert_eq!(checker.head_supported(&domain), Some(false));

    let (status, error) = checker.check(&format!("{}/other", base)).await;
    assert_eq!((status, error.as_str()), (200, ""));

    let stats = checker.checker_stats();
    assert_eq!(stats.head_fallbacks, 1);
    assert_eq!(stats.get_requests, 2);
    assert_eq!(stats.head_requests, 0);
}

#[tokio::test]
async fn test_head_success_is_remembered() {
    let server = MockServer::start().await;
    let base = server.uri();
    let domain = format!("127.0.0.1:{}", server.address().port());

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .mount(&server)
        .await;

    let checker = standalone_checker(1000.0, 1000.0, true, None);
    let (status, _) = checker.check(&format!("{}/page", base)).await;

    assert_eq!(status, 200);
    assert_eq!(checker.head_supported(&domain), Some(true));
    assert_eq!(checker.checker_stats().head_requests, 1);
    assert_eq!(checker.checker_stats().get_requests, 0);
}

#[tokio::test]
async fn test_rate_limit_spaces_out_requests() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/a", &[]).await;
    mount_page(&server, "/b", &[]).await;

    // 2 req/s with burst 1: the second request waits ~500 ms
    let checker = standalone_checker(2.0, 1.0, false, None);
    let start = Instant::now();
    checker.check(&format!("{}/a", base)).await;
    checker.check(&format!("{}/b", base)).await;

    assert!(start.elapsed() >= Duration::from_millis(450));
}

#[tokio::test]
async fn test_cache_hit_skips_the_network() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/cached"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html_page(&[]))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = LinkCache::new(Duration::from_secs(60), 100);
    let checker = standalone_checker(1000.0, 1000.0, false, Some(cache));
    let url = format!("{}/cached", base);

    let first = checker.check(&url).await;
    let second = checker.check(&url).await;

    assert_eq!(first, (200, String::new()));
    assert_eq!(second, (200, String::new()));

    let stats = checker.cache_stats().unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    // The expect(1) on the mock verifies no second request on drop
    server.verify().await;
}

#[tokio::test]
async fn test_transport_failure_yields_status_zero() {
    // Nothing listens on port 1
    let checker = standalone_checker(1000.0, 1000.0, false, None);
    let (status, error) = checker.check("http://127.0.0.1:1/page").await;

    assert_eq!(status, 0);
    assert!(!error.is_empty());
}

#[tokio::test]
async fn test_file_content_is_reported_by_status_only() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/download.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 4096])
                .insert_header("content-type", "application/pdf"),
        )
        .mount(&server)
        .await;

    let checker = standalone_checker(1000.0, 1000.0, false, None);
    let (status, error) = checker.check(&format!("{}/download.pdf", base)).await;

    assert_eq!((status, error.as_str()), (200, ""));
}

#[tokio::test]
async fn test_empty_html_body_is_flagged() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("")
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let checker = standalone_checker(1000.0, 1000.0, false, None);
    let (status, error) = checker.check(&format!("{}/empty", base)).await;

    assert_eq!(status, 200);
    assert_eq!(error, "response body is empty");
}

#[tokio::test]
async fn test_graceful_shutdown_mid_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    let pages: Vec<String> = (0..20).map(|i| format!("/page-{}", i)).collect();
    let hrefs: Vec<&str> = pages.iter().map(String::as_str).collect();
    mount_page(&server, "/", &hrefs).await;
    for page in &pages {
        Mock::given(method("GET"))
            .and(path(page.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(html_page(&[]))
                    .insert_header("content-type", "text/html")
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
    }

    let shutdown = Arc::new(ShutdownManager::with_timeouts(
        Duration::from_secs(2),
        Duration::from_millis(50),
    ));
    let config = CrawlConfig {
        concurrency: 2,
        ..test_config()
    };
    let crawler = Arc::new(
        Crawler::with_shutdown(config, AuthConfig::default(), Arc::clone(&shutdown)).unwrap(),
    );

    let runner = {
        let crawler = Arc::clone(&crawler);
        let base = base.clone();
        tokio::spawn(async move { crawler.run(&base).await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown.initiate();
    shutdown.wait_for_completion().await;

    let results = runner.await.unwrap().unwrap();

    // Snapshot is consistent and all workers are joined
    assert_eq!(crawler.pool_stats().jobs_active, 0);
    assert_eq!(crawler.state(), CrawlState::Done);
    assert!(results.len() <= 20);
    assert!(shutdown.is_shutting_down());
    assert!(shutdown.token().is_cancelled());
}

#[tokio::test]
async fn test_duplicate_anchors_yield_duplicate_results() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", &["/twice", "/twice"]).await;
    mount_page(&server, "/twice", &[]).await;

    let config = CrawlConfig {
        max_depth: 0,
        ..test_config()
    };
    let crawler = Crawler::new(config, AuthConfig::default()).unwrap();
    let results = crawler.run(&base).await.unwrap();

    // No per-page dedup: two anchors, two results
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].target_url, results[1].target_url);
}
