//! Progress reporting for interactive runs: a single-line bar refreshed
//! in place plus a final summary. Disabled entirely in quiet mode.

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ProgressTracker {
    total_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    active_tasks: AtomicI64,
    error_count: AtomicU64,

    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    bytes_saved: AtomicU64,
    head_requests: AtomicU64,
    get_requests: AtomicU64,

    start: Instant,
    enabled: bool,
    last_line_length: AtomicUsize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub active_tasks: i64,
    pub error_count: u64,
    pub progress_percent: f64,
    pub links_per_second: f64,
    pub cache_hit_rate: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub bytes_saved: u64,
    pub head_requests: u64,
    pub get_requests: u64,
    pub elapsed: Duration,
}

impl ProgressTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            total_tasks: AtomicU64::new(0),
            completed_tasks: AtomicU64::new(0),
            active_tasks: AtomicI64::new(0),
            error_count: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            bytes_saved: AtomicU64::new(0),
            head_requests: AtomicU64::new(0),
            get_requests: AtomicU64::new(0),
            start: Instant::now(),
            enabled,
            last_line_length: AtomicUsize::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_total(&self, total: u64) {
        self.total_tasks.store(total, Ordering::Relaxed);
    }

    pub fn set_active(&self, active: i64) {
        self.active_tasks.store(active, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.completed_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_cache_stats(&self, hits: u64, misses: u64) {
        self.cache_hits.store(hits, Ordering::Relaxed);
        self.cache_misses.store(misses, Ordering::Relaxed);
    }

    pub fn update_bandwidth_stats(&self, bytes_saved: u64, head_requests: u64, get_requests: u64) {
        self.bytes_saved.store(bytes_saved, Ordering::Relaxed);
        self.head_requests.store(head_requests, Ordering::Relaxed);
        self.get_requests.store(get_requests, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ProgressStats {
        let elapsed = self.start.elapsed();
        let completed = self.completed_tasks.load(Ordering::Relaxed);
        let total = self.total_tasks.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);

        let links_per_second = if elapsed.as_secs_f64() > 0.0 {
            completed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let cache_hit_rate = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64 * 100.0
        } else {
            0.0
        };

        let progress_percent = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        ProgressStats {
            total_tasks: total,
            completed_tasks: completed,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            progress_percent,
            links_per_second,
            cache_hit_rate,
            cache_hits: hits,
            cache_misses: misses,
            bytes_saved: self.bytes_saved.load(Ordering::Relaxed),
            head_requests: self.head_requests.load(Ordering::Relaxed),
            get_requests: self.get_requests.load(Ordering::Relaxed),
            elapsed,
        }
    }

    /// Redraw the progress line in place on stderr.
    pub fn render(&self) {
        if !self.enabled {
            return;
        }

        let stats = self.stats();
        self.clear_line();

        let bar_width = 40usize;
        let filled = ((stats.progress_percent / 100.0 * bar_width as f64) as usize).min(bar_width);
        let bar: String = "#".repeat(filled) + &"-".repeat(bar_width - filled);

        let line = format!(
            "[{}] {:.1}% | {}/{} links | {:.1}/s | cache: {:.1}% | saved: {} | active: {} | errors: {}",
            bar,
            stats.progress_percent,
            stats.completed_tasks,
            stats.total_tasks,
            stats.links_per_second,
            stats.cache_hit_rate,
            format_bytes(stats.bytes_saved),
            stats.active_tasks,
            stats.error_count,
        );

        eprint!("{}", line);
        self.last_line_length.store(line.len(), Ordering::Relaxed);
    }

    /// Clear the bar and print the final summary.
    pub fn finish(&self) {
        if !self.enabled {
            return;
        }

        let stats = self.stats();
        self.clear_line();

        eprintln!(
            "Scan completed in {:.1}s",
            stats.elapsed.as_secs_f64()
        );
        eprintln!(
            "  Links checked: {} ({:.1}/s)",
            stats.completed_tasks, stats.links_per_second
        );

        if stats.cache_hits + stats.cache_misses > 0 {
            eprintln!(
                "  Cache efficiency: {:.1}% ({} hits, {} misses)",
                stats.cache_hit_rate, stats.cache_hits, stats.cache_misses
            );
        }

        if stats.head_requests + stats.get_requests > 0 {
            eprintln!(
                "  Requests: {} HEAD, {} GET, {} saved",
                stats.head_requests,
                stats.get_requests,
                format_bytes(stats.bytes_saved)
            );
        }

        if stats.error_count > 0 {
            eprintln!("  Errors encountered: {}", stats.error_count);
        }
    }

    fn clear_line(&self) {
        let last = self.last_line_length.swap(0, Ordering::Relaxed);
        if last > 0 {
            eprint!("\r{}\r", " ".repeat(last));
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, ['K', 'M', 'G', 'T', 'P', 'E'][exp])
}
