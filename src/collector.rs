//! Thread-safe result log and visited-URL set.

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::models::LinkResult;

/// Append-only result collection plus the authoritative set of URLs
/// already dispatched for parsing.
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: Mutex<Vec<LinkResult>>,
    visited: DashMap<String, ()>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&self, result: LinkResult) {
        self.results.lock().push(result);
    }

    /// Snapshot copy, decoupling readers from concurrent writers.
    pub fn get_results(&self) -> Vec<LinkResult> {
        self.results.lock().clone()
    }

    pub fn count_broken(&self) -> usize {
        self.results.lock().iter().filter(|r| r.is_broken()).count()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains_key(url)
    }

    /// Atomic test-and-set: returns true only for the first caller to
    /// mark the URL. Workers rely on this to guarantee at-most-once
    /// page processing.
    pub fn mark_visited(&self, url: &str) -> bool {
        self.visited.insert(url.to_string(), ()).is_none()
    }

    pub fn clear(&self) {
        self.results.lock().clear();
        self.visited.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(target: &str, status: u16, error: &str) -> LinkResult {
        LinkResult {
            source_url: "https://test.local/".to_string(),
            target_url: target.to_string(),
            status,
            error: error.to_string(),
            is_external: false,
        }
    }

    #[test]
    fn test_results_snapshot() {
        let collector = ResultCollector::new();
        collector.add_result(result("https://test.local/a", 200, ""));

        let snapshot = collector.get_results();
        collector.add_result(result("https://test.local/b", 404, ""));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(collector.get_results().len(), 2);
    }

    #[test]
    fn test_count_broken() {
        let collector = ResultCollector::new();
        collector.add_result(result("https://test.local/ok", 200, ""));
        collector.add_result(result("https://test.local/gone", 404, ""));
        collector.add_result(result("https://test.local/down", 0, "connection refused"));
        assert_eq!(collector.count_broken(), 2);
    }

    #[test]
    fn test_mark_visited_is_test_and_set() {
        let collector = ResultCollector::new();
        assert!(!collector.is_visited("https://test.local/x"));
        assert!(collector.mark_visited("https://test.local/x"));
        assert!(!collector.mark_visited("https://test.local/x"));
        assert!(collector.is_visited("https://test.local/x"));
    }

    #[test]
    fn test_clear() {
        let collector = ResultCollector::new();
        collector.add_result(result("https://test.local/a", 200, ""));
        collector.mark_visited("https://test.local/a");
        collector.clear();
        assert!(collector.get_results().is_empty());
        assert!(!collector.is_visited("https://test.local/a"));
    }

    #[test]
    fn test_concurrent_mark_visited_single_winner() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let collector = Arc::new(ResultCollector::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let collector = Arc::clone(&collector);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if collector.mark_visited("https://test.local/contended") {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
