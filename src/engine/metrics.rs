//! LETHE - Engine Metrics
//! Lock-free operation counters using `AtomicU64`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic operation counters for the store.
///
/// Counters use `Ordering::Relaxed`; they are observational only.
#[derive(Debug)]
pub struct EngineMetrics {
    /// Total number of `set` operations.
    pub sets: AtomicU64,
    /// Total number of `get` operations.
    pub gets: AtomicU64,
    /// `get` operations that returned a value.
    pub hits: AtomicU64,
    /// `delete` operations that removed a key.
    pub deletes: AtomicU64,
    /// Keys removed on read because their TTL had elapsed.
    pub lazy_expirations: AtomicU64,
    /// Keys removed by the expiration worker.
    pub timer_expirations: AtomicU64,
    /// Successful snapshot saves.
    pub saves: AtomicU64,
    /// Successful snapshot loads.
    pub loads: AtomicU64,
    started: Instant,
}

impl EngineMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            sets: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            lazy_expirations: AtomicU64::new(0),
            timer_expirations: AtomicU64::new(0),
            saves: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get(&self, hit: bool) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lazy_expiration(&self) {
        self.lazy_expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timer_expiration(&self) {
        self.timer_expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Seconds since the store was opened.
    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Client-issued operations (sets + gets + deletes).
    pub fn total_ops(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
            + self.gets.load(Ordering::Relaxed)
            + self.deletes.load(Ordering::Relaxed)
    }

    /// Fraction of gets that found a value, 0.0 when there were none.
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets.load(Ordering::Relaxed);
        if gets == 0 {
            return 0.0;
        }
        self.hits.load(Ordering::Relaxed) as f64 / gets as f64
    }

    /// Format metrics as a human-readable report.
    pub fn report(&self) -> String {
        format!(
            "\n═══ LETHE Store Metrics ═══\n\
             Operations: {}\n\
               sets:      {}\n\
               gets:      {} (hit ratio {:.2})\n\
               deletes:   {}\n\
             Expirations:\n\
               lazy:      {}\n\
               timer:     {}\n\
             Snapshots:\n\
               saves:     {}\n\
               loads:     {}\n\
             Uptime: {:.2}s",
            self.total_ops(),
            self.sets.load(Ordering::Relaxed),
            self.gets.load(Ordering::Relaxed),
            self.hit_ratio(),
            self.deletes.load(Ordering::Relaxed),
            self.lazy_expirations.load(Ordering::Relaxed),
            self.timer_expirations.load(Ordering::Relaxed),
            self.saves.load(Ordering::Relaxed),
            self.loads.load(Ordering::Relaxed),
            self.uptime_secs(),
        )
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
