//! Session metrics and observability.
//!
//! Counters track how often `t` hits the cache, how many write-backs the
//! auto-registrar issues, and how fetches resolve. Each session owns its own
//! counters so several sessions (e.g. one per app) can be told apart.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-session counters.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Labels resolved from the cached translation set
    cache_hits: AtomicUsize,

    /// Labels that fell back to the raw label
    cache_misses: AtomicUsize,

    /// Remote writes issued by auto-registration
    registrations: AtomicUsize,

    /// Remote reads started
    fetches: AtomicUsize,

    /// Snapshots that replaced (or were allowed to keep) the cache
    snapshots_applied: AtomicUsize,

    /// Snapshots dropped because their fetch was superseded or the session closed
    stale_snapshots: AtomicUsize,

    /// Remote reads that failed
    read_failures: AtomicUsize,

    /// Remote writes that failed after retries
    write_failures: AtomicUsize,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit (label resolved from the active translations).
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss (label returned as-is).
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one auto-registration write being issued.
    pub fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fetch being started.
    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a snapshot replacing the active translations.
    pub fn record_snapshot_applied(&self) {
        self.snapshots_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a snapshot dropped because its fetch was superseded.
    pub fn record_stale_snapshot(&self) {
        self.stale_snapshots.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed remote read.
    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a remote write that failed after retries.
    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total_lookups = hits + misses;
        let cache_hit_rate = if total_lookups > 0 {
            (hits as f64 / total_lookups as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            registrations: self.registrations.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            snapshots_applied: self.snapshots_applied.load(Ordering::Relaxed),
            stale_snapshots: self.stale_snapshots.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub registrations: usize,
    pub fetches: usize,
    pub snapshots_applied: usize,
    pub stale_snapshots: usize,
    pub read_failures: usize,
    pub write_failures: usize,
}
