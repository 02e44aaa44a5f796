//! Store Trait Module
//!
//! The raw key-value contract shared by every cache backend.

use std::collections::HashSet;

use crate::cache::{CacheValue, EntryInfo};
use crate::error::Result;

/// A store holds timestamped values and knows nothing about TTLs.
///
/// Implementations must be safe to call from several threads at once without external
/// locking. A missing key is reported as `Ok(None)` / `Ok(false)`, never as an error.
pub trait Store: Send + Sync {
    /// A short name for logs.
    ///
    /// # Example
    /// - "memory"
    /// - "sqlite"
    fn name(&self) -> &'static str;

    /// Whether entries survive the process.
    fn is_persistent(&self) -> bool;

    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<CacheValue>>;

    /// Returns the value together with its timestamp and current age.
    fn get_with_info(&self, key: &str) -> Result<Option<EntryInfo>>;

    /// Stores `value` under `key` with the current time as its timestamp.
    fn set(&self, key: &str, value: CacheValue) -> Result<()>;

    /// Stores `value` under `key` with an explicit timestamp.
    ///
    /// Overwrites keep the key's first-seen creation time.
    fn set_with_timestamp(&self, key: &str, value: CacheValue, timestamp: f64) -> Result<()>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Removes `key`, returning true if it was present.
    fn delete(&self, key: &str) -> Result<bool>;

    fn clear(&self) -> Result<()>;

    /// Snapshot of the keys present at call time.
    fn keys(&self) -> Result<HashSet<String>>;

    fn size(&self) -> Result<usize>;

    /// Seconds since the last write to `key`.
    fn get_age(&self, key: &str) -> Result<Option<f64>>;

    /// Last write time of `key` (Unix seconds).
    fn get_timestamp(&self, key: &str) -> Result<Option<f64>>;

    /// Removes entries first written more than `days` days ago.
    ///
    /// Returns the number of entries removed.
    fn cleanup_old_entries(&self, days: u32) -> Result<usize>;
}
