//! Cache Statistics Module
//!
//! Tracks facade-level lookup outcomes: hits, misses, stale reads and factory refreshes.

use serde::Serialize;

// == Cache Stats ==
/// Counters kept by the cache facade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups for keys that were not cached
    pub misses: u64,
    /// Lookups that found an entry older than the requested TTL
    pub stale: u64,
    /// Factory invocations whose result was written back
    pub refreshes: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Stale reads count against the rate. Returns 0.0 if no lookups were made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.stale;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Stale ==
    pub fn record_stale(&mut self) {
        self.stale += 1;
    }

    // == Record Refresh ==
    pub fn record_refresh(&mut self) {
        self.refreshes += 1;
    }
}
