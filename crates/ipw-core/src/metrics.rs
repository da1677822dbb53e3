//! Global atomic counters for webhook observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at shutdown).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters: no allocations, no locking.
pub struct Metrics {
    reviews_allowed: AtomicU64,
    reviews_denied: AtomicU64,
    images_replicated: AtomicU64,
    replication_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            reviews_allowed: AtomicU64::new(0),
            reviews_denied: AtomicU64::new(0),
            images_replicated: AtomicU64::new(0),
            replication_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_reviews_allowed(&self) {
        self.reviews_allowed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reviews_allowed", "counter incremented");
    }

    pub fn inc_reviews_denied(&self) {
        self.reviews_denied.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reviews_denied", "counter incremented");
    }

    /// Add `n` images pushed to the private registry.
    pub fn add_images_replicated(&self, n: u64) {
        self.images_replicated.fetch_add(n, Ordering::Relaxed);
    }

    /// Add `n` failed pull, tag or push operations.
    pub fn add_replication_failures(&self, n: u64) {
        self.replication_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn reviews_allowed(&self) -> u64 {
        self.reviews_allowed.load(Ordering::Relaxed)
    }

    pub fn reviews_denied(&self) -> u64 {
        self.reviews_denied.load(Ordering::Relaxed)
    }

    pub fn images_replicated(&self) -> u64 {
        self.images_replicated.load(Ordering::Relaxed)
    }

    pub fn replication_failures(&self) -> u64 {
        self.replication_failures.load(Ordering::Relaxed)
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            reviews_allowed = self.reviews_allowed(),
            reviews_denied = self.reviews_denied(),
            images_replicated = self.images_replicated(),
            replication_failures = self.replication_failures(),
        );
    }
}
