//! Memory Store Module
//!
//! Volatile backend: a HashMap of timestamped entries behind a read-write lock.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::backend::Store;
use crate::cache::entry::{check_timestamp, now_secs};
use crate::cache::{CacheEntry, CacheValue, EntryInfo, SECONDS_PER_DAY};
use crate::error::Result;

// == Memory Store ==
/// In-process cache storage. Entries live as long as the store does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty MemoryStore.
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Writes an entry, keeping the first-seen creation time of an existing key.
    fn insert(&self, key: &str, mut entry: CacheEntry) {
        let mut entries = self.entries.write();
        if let Some(previous) = entries.get(key) {
            entry.created_at = previous.created_at;
        }
        entries.insert(key.to_string(), entry);
    }

    // == Lookup ==
    /// Runs `f` against the entry for `key` under the read lock.
    fn with_entry<T>(&self, key: &str, f: impl FnOnce(&CacheEntry) -> T) -> Option<T> {
        self.entries.read().get(key).map(f)
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_persistent(&self) -> bool {
        false
    }

    fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        Ok(self.with_entry(key, |entry| entry.value.clone()))
    }

    fn get_with_info(&self, key: &str) -> Result<Option<EntryInfo>> {
        Ok(self.with_entry(key, CacheEntry::info))
    }

    fn set(&self, key: &str, value: CacheValue) -> Result<()> {
        self.insert(key, CacheEntry::new(value));
        debug!(key, "memory set");
        Ok(())
    }

    fn set_with_timestamp(&self, key: &str, value: CacheValue, timestamp: f64) -> Result<()> {
        check_timestamp(timestamp)?;
        self.insert(key, CacheEntry::with_timestamp(value, timestamp));
        debug!(key, timestamp, "memory set with explicit timestamp");
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn keys(&self) -> Result<HashSet<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn size(&self) -> Result<usize> {
        Ok(self.len())
    }

    fn get_age(&self, key: &str) -> Result<Option<f64>> {
        Ok(self.with_entry(key, CacheEntry::age_seconds))
    }

    fn get_timestamp(&self, key: &str) -> Result<Option<f64>> {
        Ok(self.with_entry(key, |entry| entry.timestamp))
    }

    fn cleanup_old_entries(&self, days: u32) -> Result<usize> {
        let cutoff = now_secs() - f64::from(days) * SECONDS_PER_DAY;
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at >= cutoff);
        let removed = before - entries.len();

        debug!(days, removed, "memory retention sweep");
        Ok(removed)
    }
}
