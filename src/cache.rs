//! Bounded TTL cache for link-check results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    status: u16,
    message: String,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub hit_rate: f64,
    pub max_size: usize,
}

/// URL -> (status, message) cache with per-entry TTL and oldest-first
/// eviction once `max_entries` is reached. Expired entries are left in
/// place on read and reaped by `cleanup` or the eviction path.
pub struct LinkCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LinkCache {
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Unexpired hit or nothing. Hits and misses bump separate counters.
    pub fn get(&self, url: &str) -> Option<(u16, String)> {
        let entries = self.entries.read();
        match entries.get(url) {
            Some(entry) if !entry.is_expired(Instant::now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some((entry.status, entry.message.clone()))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, url: &str, status: u16, message: &str) {
        self.set_with_ttl(url, status, message, self.default_ttl);
    }

    pub fn set_with_ttl(&self, url: &str, status: u16, message: &str, ttl: Duration) {
        let mut entries = self.entries.write();

        if entries.len() >= self.max_entries {
            let now = Instant::now();
            entries.retain(|_, e| !e.is_expired(now));

            if entries.len() >= self.max_entries {
                remove_oldest(&mut entries);
            }
        }

        entries.insert(
            url.to_string(),
            CacheEntry {
                status,
                message: message.to_string(),
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn cleanup(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            size: self.len(),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            max_size: self.max_entries,
        }
    }
}

fn remove_oldest(entries: &mut HashMap<String, CacheEntry>) {
    let oldest = entries
        .iter()
        .min_by_key(|(_, e)| e.inserted_at)
        .map(|(url, _)| url.clone());
    if let Some(url) = oldest {
        entries.remove(&url);
    }
}

/// TTL policy by status band. Stable responses cache longer; transient
/// failures expire quickly so the next run rechecks them.
pub fn ttl_for_status(status: u16, base: Duration) -> Duration {
    match status {
        200..=299 => base * 2,
        404 | 410 => base,
        500..=599 => base / 4,
        429 => base / 10,
        _ => base / 2,
    }
}
