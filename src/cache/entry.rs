//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with write timestamps.

use chrono::Utc;
use serde::Serialize;

use crate::cache::CacheValue;
use crate::error::{CacheError, Result};

// == Cache Entry ==
/// Represents a single cache entry with value and timing metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The stored value
    pub value: CacheValue,
    /// Last write time (Unix seconds)
    pub timestamp: f64,
    /// First time the key was written (Unix seconds), kept across overwrites
    pub created_at: f64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    pub fn new(value: CacheValue) -> Self {
        Self::with_timestamp(value, now_secs())
    }

    /// Creates an entry with an explicit write timestamp.
    ///
    /// Used for deterministic replay and tests; `created_at` starts equal to `timestamp`.
    pub fn with_timestamp(value: CacheValue, timestamp: f64) -> Self {
        Self {
            value,
            timestamp,
            created_at: timestamp,
        }
    }

    // == Age ==
    /// Returns the entry age in seconds, measured against the current time.
    ///
    /// Never negative, even for timestamps set in the future.
    pub fn age_seconds(&self) -> f64 {
        age_since(self.timestamp)
    }

    // == Info ==
    /// Returns a snapshot of the value with its timestamp and current age.
    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            value: self.value.clone(),
            timestamp: Some(self.timestamp),
            age_seconds: Some(self.age_seconds()),
        }
    }
}

// == Entry Info ==
/// Value plus timing metadata as returned by `get_with_info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub value: CacheValue,
    /// Last write time, `None` for a substituted default
    pub timestamp: Option<f64>,
    /// Age at read time, `None` for a substituted default
    pub age_seconds: Option<f64>,
}

impl EntryInfo {
    /// Info for a key that is not cached: carries the default and no timing data.
    pub fn synthetic(value: CacheValue) -> Self {
        Self {
            value,
            timestamp: None,
            age_seconds: None,
        }
    }

    /// True when this info describes a real cache entry.
    pub fn is_cached(&self) -> bool {
        self.timestamp.is_some()
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in seconds with sub-second precision.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Seconds elapsed since `timestamp`, clamped at zero.
pub fn age_since(timestamp: f64) -> f64 {
    (now_secs() - timestamp).max(0.0)
}

/// Rejects write timestamps that no age can be computed from.
pub fn check_timestamp(timestamp: f64) -> Result<()> {
    if timestamp.is_finite() {
        Ok(())
    } else {
        Err(CacheError::InvalidTimestamp(timestamp))
    }
}
