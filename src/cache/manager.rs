//! Cache Manager Module
//!
//! Backend-agnostic facade over a `Store`: default substitution, fill-on-miss,
//! TTL helpers and the expired-key sweep.
//!
//! TTLs are caller policy. Stores only record when an entry was written; the manager
//! classifies each entry against the TTL passed to each call:
//!
//! - `Fresh`: entry exists and `age <= ttl`
//! - `Stale`: entry exists and `age > ttl`
//! - `Absent`: no entry
//!
//! Fill operations (`get_or_set*`) take a per-key in-flight lock after a miss and
//! re-check the store before calling the factory, so concurrent misses on one key in
//! one manager produce a single factory call. Separate processes sharing a database
//! file are not coordinated.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::backend::Store;
use crate::cache::flight::InFlight;
use crate::cache::memory::MemoryStore;
use crate::cache::persistent::PersistentStore;
use crate::cache::{to_cache_value, CacheStats, CacheValue, EntryInfo};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Freshness ==
/// Classification of a key against a TTL at the moment it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Absent,
}

impl Freshness {
    /// Classifies an entry age (or its absence) against `ttl`.
    pub fn classify(age_seconds: Option<f64>, ttl: Duration) -> Self {
        match age_seconds {
            None => Freshness::Absent,
            Some(age) if age <= ttl.as_secs_f64() => Freshness::Fresh,
            Some(_) => Freshness::Stale,
        }
    }

    /// Stale and absent keys both count as expired.
    pub fn is_expired(self) -> bool {
        self != Freshness::Fresh
    }
}

// == Cache Manager ==
/// Unified cache interface over one backend, fixed at construction.
///
/// Share a manager between threads with `Arc<CacheManager>`.
pub struct CacheManager {
    store: Box<dyn Store>,
    flights: InFlight,
    stats: Mutex<CacheStats>,
}

impl CacheManager {
    // == Constructors ==
    /// Creates a manager over an empty in-memory store.
    pub fn memory() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// Creates a manager over the SQLite database at `path`.
    pub fn persistent(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_store(PersistentStore::open(path)?))
    }

    /// Selects the backend: SQLite at `storage_path` when `use_persistent`, memory otherwise.
    ///
    /// `storage_path` is ignored by the memory backend.
    pub fn new(use_persistent: bool, storage_path: impl AsRef<Path>) -> Result<Self> {
        if use_persistent {
            Self::persistent(storage_path)
        } else {
            Ok(Self::memory())
        }
    }

    /// Builds a manager from validated configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        if config.use_persistent {
            let store =
                PersistentStore::open_with_timeout(&config.storage_path, config.busy_timeout())?;
            Ok(Self::with_store(store))
        } else {
            Ok(Self::memory())
        }
    }

    /// Wraps an arbitrary store implementation.
    pub fn with_store(store: impl Store + 'static) -> Self {
        info!(backend = store.name(), "cache manager created");
        Self {
            store: Box::new(store),
            flights: InFlight::new(),
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// True when entries survive the process.
    pub fn is_persistent(&self) -> bool {
        self.store.is_persistent()
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    /// Snapshot of the lookup counters.
    ///
    /// Value reads are counted: `get`, `get_with_info`, `get_if_fresh` and the fill
    /// operations. Metadata probes (`freshness`, `is_expired`, `exists`, `get_age`) and
    /// the expired-key sweep are not.
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    // == Reads ==
    /// Returns the cached value, `None` if the key is absent.
    ///
    /// A stored `null` is returned as `Some(Value::Null)`.
    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let value = self.store.get(key)?;
        self.record(if value.is_some() {
            Freshness::Fresh
        } else {
            Freshness::Absent
        });
        Ok(value)
    }

    /// Returns the cached value, or `default` if the key is absent.
    pub fn get_or(&self, key: &str, default: impl Into<CacheValue>) -> Result<CacheValue> {
        Ok(self.get(key)?.unwrap_or_else(|| default.into()))
    }

    /// Returns the cached value decoded as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.get(key)?.map(serde_json::from_value).transpose()?)
    }

    /// Returns the value with its timestamp and age.
    pub fn get_with_info(&self, key: &str) -> Result<Option<EntryInfo>> {
        let info = self.store.get_with_info(key)?;
        self.record(if info.is_some() {
            Freshness::Fresh
        } else {
            Freshness::Absent
        });
        Ok(info)
    }

    /// Like `get_with_info`, but an absent key yields `default` with no timing data.
    pub fn get_with_info_or(&self, key: &str, default: impl Into<CacheValue>) -> Result<EntryInfo> {
        Ok(self
            .get_with_info(key)?
            .unwrap_or_else(|| EntryInfo::synthetic(default.into())))
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.store.exists(key)
    }

    pub fn keys(&self) -> Result<HashSet<String>> {
        self.store.keys()
    }

    pub fn size(&self) -> Result<usize> {
        self.store.size()
    }

    /// Seconds since `key` was last written.
    pub fn get_age(&self, key: &str) -> Result<Option<f64>> {
        self.store.get_age(key)
    }

    /// Last write time of `key` (Unix seconds).
    pub fn get_timestamp(&self, key: &str) -> Result<Option<f64>> {
        self.store.get_timestamp(key)
    }

    // == Writes ==
    /// Stores `value` under `key`, stamped with the current time.
    ///
    /// # Errors
    /// `Serialization` if `value` has no JSON representation, including NaN and
    /// infinite floats; nothing is written in that case.
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        self.set_serialized(key, &value)
    }

    /// Borrowing form of `set`, for unsized or expensive-to-move values.
    pub fn set_serialized<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = to_cache_value(value)?;
        self.store.set(key, value)
    }

    /// Stores `value` with an explicit write timestamp (Unix seconds).
    ///
    /// # Errors
    /// `InvalidTimestamp` if `timestamp` is NaN or infinite, `Serialization` as for `set`.
    pub fn set_with_timestamp<T: Serialize>(&self, key: &str, value: T, timestamp: f64) -> Result<()> {
        let value = to_cache_value(&value)?;
        self.store.set_with_timestamp(key, value, timestamp)
    }

    /// Removes `key`, returning true if it was present.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.store.delete(key)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    /// Removes entries first written more than `days` days ago.
    pub fn cleanup_old_entries(&self, days: u32) -> Result<usize> {
        self.store.cleanup_old_entries(days)
    }

    // == Fill On Miss ==
    /// Returns the cached value, or computes it with `factory`, stores it and returns it.
    pub fn get_or_set<F, V>(&self, key: &str, factory: F) -> Result<CacheValue>
    where
        F: FnOnce() -> V,
        V: Serialize,
    {
        self.try_get_or_set(key, || Ok::<V, CacheError>(factory()))
    }

    /// Fallible `get_or_set`: a factory error is returned and nothing is stored.
    pub fn try_get_or_set<F, V, E>(&self, key: &str, factory: F) -> std::result::Result<CacheValue, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
        V: Serialize,
        E: From<CacheError>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }

        self.flights.run(key, || -> std::result::Result<CacheValue, E> {
            // Another caller may have filled the key while we waited.
            if let Some(value) = self.store.get(key)? {
                return Ok(value);
            }
            self.fill(key, factory)
        })
    }

    // == TTL Helpers ==
    /// Classifies `key` against `ttl`.
    pub fn freshness(&self, key: &str, ttl: Duration) -> Result<Freshness> {
        Ok(Freshness::classify(self.store.get_age(key)?, ttl))
    }

    /// True if `key` is absent or older than `ttl`.
    pub fn is_expired(&self, key: &str, ttl: Duration) -> Result<bool> {
        Ok(self.freshness(key, ttl)?.is_expired())
    }

    /// Returns the cached value only while it is fresh.
    pub fn get_if_fresh(&self, key: &str, ttl: Duration) -> Result<Option<CacheValue>> {
        let (freshness, info) = self.lookup(key, ttl)?;
        Ok(match (freshness, info) {
            (Freshness::Fresh, Some(info)) => Some(info.value),
            _ => None,
        })
    }

    /// Returns the cached value while fresh, `default` when stale or absent.
    pub fn get_if_fresh_or(
        &self,
        key: &str,
        ttl: Duration,
        default: impl Into<CacheValue>,
    ) -> Result<CacheValue> {
        Ok(self
            .get_if_fresh(key, ttl)?
            .unwrap_or_else(|| default.into()))
    }

    /// Cache-aside with refresh on staleness.
    ///
    /// A fresh entry is returned as is, without calling `factory` or writing. A stale
    /// or absent entry is replaced by the factory result, which is returned.
    pub fn get_or_set_if_stale<F, V>(&self, key: &str, factory: F, ttl: Duration) -> Result<CacheValue>
    where
        F: FnOnce() -> V,
        V: Serialize,
    {
        self.try_get_or_set_if_stale(key, || Ok::<V, CacheError>(factory()), ttl)
    }

    /// Fallible `get_or_set_if_stale`: on factory error the stale entry is left in place.
    pub fn try_get_or_set_if_stale<F, V, E>(
        &self,
        key: &str,
        factory: F,
        ttl: Duration,
    ) -> std::result::Result<CacheValue, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
        V: Serialize,
        E: From<CacheError>,
    {
        if let (Freshness::Fresh, Some(info)) = self.lookup(key, ttl)? {
            return Ok(info.value);
        }

        self.flights.run(key, || -> std::result::Result<CacheValue, E> {
            // Another caller may have refreshed the key while we waited.
            if let Some(info) = self.store.get_with_info(key)? {
                if Freshness::classify(info.age_seconds, ttl) == Freshness::Fresh {
                    return Ok(info.value);
                }
            }
            self.fill(key, factory)
        })
    }

    /// Deletes every key that is expired under `ttl`.
    ///
    /// Returns the number of keys actually deleted; keys removed concurrently between
    /// enumeration and deletion are not counted.
    pub fn cleanup_expired_keys(&self, ttl: Duration) -> Result<usize> {
        let mut removed = 0;
        for key in self.store.keys()? {
            if self.is_expired(&key, ttl)? && self.store.delete(&key)? {
                removed += 1;
            }
        }

        debug!(removed, ttl_secs = ttl.as_secs_f64(), "expired keys swept");
        Ok(removed)
    }

    // == Internals ==
    /// Single read of `key`, classified against `ttl` and counted in the stats.
    fn lookup(&self, key: &str, ttl: Duration) -> Result<(Freshness, Option<EntryInfo>)> {
        let info = self.store.get_with_info(key)?;
        let freshness = Freshness::classify(info.as_ref().and_then(|i| i.age_seconds), ttl);
        self.record(freshness);
        Ok((freshness, info))
    }

    fn fill<F, V, E>(&self, key: &str, factory: F) -> std::result::Result<CacheValue, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
        V: Serialize,
        E: From<CacheError>,
    {
        let value = to_cache_value(&factory()?)?;
        self.store.set(key, value.clone())?;
        self.stats.lock().record_refresh();

        debug!(key, backend = self.store.name(), "cache filled from factory");
        Ok(value)
    }

    fn record(&self, freshness: Freshness) {
        let mut stats = self.stats.lock();
        match freshness {
            Freshness::Fresh => stats.record_hit(),
            Freshness::Stale => stats.record_stale(),
            Freshness::Absent => stats.record_miss(),
        }
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("backend", &self.store.name())
            .field("in_flight", &self.flights.len())
            .field("stats", &*self.stats.lock())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::thread::sleep;
    use tempfile::TempDir;

    use crate::cache::entry::now_secs;

    /// One manager per backend; the TempDir keeps the database file alive.
    fn managers() -> Vec<(Option<TempDir>, CacheManager)> {
        let dir = TempDir::new().unwrap();
        let persistent = CacheManager::persistent(dir.path().join("test_cache.db")).unwrap();
        vec![(None, CacheManager::memory()), (Some(dir), persistent)]
    }

    #[test]
    fn test_freshness_classify() {
        let ttl = Duration::from_secs(5);
        assert_eq!(Freshness::classify(None, ttl), Freshness::Absent);
        assert_eq!(Freshness::classify(Some(0.0), ttl), Freshness::Fresh);
        assert_eq!(Freshness::classify(Some(5.0), ttl), Freshness::Fresh);
        assert_eq!(Freshness::classify(Some(5.001), ttl), Freshness::Stale);

        assert!(!Freshness::Fresh.is_expired());
        assert!(Freshness::Stale.is_expired());
        assert!(Freshness::Absent.is_expired());
    }

    #[test]
    fn test_new_selects_backend() {
        let dir = TempDir::new().unwrap();

        let memory = CacheManager::new(false, "ignored.db").unwrap();
        assert!(!memory.is_persistent());
        assert_eq!(memory.backend_name(), "memory");

        let persistent = CacheManager::new(true, dir.path().join("c.db")).unwrap();
        assert!(persistent.is_persistent());
        assert_eq!(persistent.backend_name(), "sqlite");
    }

    #[test]
    fn test_from_config_rejects_unusable_path() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            use_persistent: true,
            storage_path: dir.path().join("no_such_dir").join("cache.db"),
            ..CacheConfig::default()
        };

        assert!(matches!(
            CacheManager::from_config(&config),
            Err(CacheError::Configuration(_))
        ));
    }

    #[test]
    fn test_set_get() {
        for (_dir, cache) in managers() {
            cache.set("k1", 42).unwrap();

            assert_eq!(cache.get("k1").unwrap(), Some(json!(42)));
            assert!(cache.exists("k1").unwrap());
            assert!(cache.keys().unwrap().contains("k1"));
            assert_eq!(cache.size().unwrap(), 1);
        }
    }

    #[test]
    fn test_get_or_default() {
        for (_dir, cache) in managers() {
            assert_eq!(cache.get_or("missing", "fallback").unwrap(), json!("fallback"));

            cache.set("present", "value").unwrap();
            assert_eq!(cache.get_or("present", "fallback").unwrap(), json!("value"));
        }
    }

    #[test]
    fn test_stored_null_is_not_absent() {
        for (_dir, cache) in managers() {
            cache.set("nothing", CacheValue::Null).unwrap();

            assert_eq!(cache.get("nothing").unwrap(), Some(CacheValue::Null));
            assert_eq!(cache.get_or("nothing", "fallback").unwrap(), CacheValue::Null);
            assert_eq!(
                cache.get_or_set("nothing", || "replacement").unwrap(),
                CacheValue::Null
            );
        }
    }

    #[test]
    fn test_get_with_info_or_default() {
        for (_dir, cache) in managers() {
            let info = cache.get_with_info_or("missing", json!({"d": 1})).unwrap();
            assert_eq!(info, EntryInfo::synthetic(json!({"d": 1})));

            cache.set("present", json!([1])).unwrap();
            let info = cache.get_with_info_or("present", json!(null)).unwrap();
            assert_eq!(info.value, json!([1]));
            assert!(info.age_seconds.unwrap() < 1.0);
            assert!(cache.get_with_info("missing").unwrap().is_none());
        }
    }

    #[test]
    fn test_delete_and_clear() {
        for (_dir, cache) in managers() {
            cache.set("k2", "value").unwrap();
            assert!(cache.delete("k2").unwrap());
            assert_eq!(cache.get("k2").unwrap(), None);
            assert!(!cache.delete("k2").unwrap());

            cache.set("k3", "another").unwrap();
            cache.clear().unwrap();
            assert_eq!(cache.size().unwrap(), 0);
            assert!(!cache.exists("k3").unwrap());
        }
    }

    #[test]
    fn test_typed_roundtrip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Fund {
            isin: String,
            ter: f64,
            holdings: Vec<String>,
        }

        for (_dir, cache) in managers() {
            let fund = Fund {
                isin: "IE00B4L5Y983".to_string(),
                ter: 0.25,
                holdings: vec!["AAPL".to_string(), "MSFT".to_string()],
            };

            cache.set_serialized("fund", &fund).unwrap();
            assert_eq!(cache.get_as::<Fund>("fund").unwrap(), Some(fund));
            assert_eq!(cache.get_as::<Fund>("missing").unwrap(), None);
        }
    }

    #[test]
    fn test_set_serialized_rejects_non_json_values() {
        for (_dir, cache) in managers() {
            let mut bad: BTreeMap<(i32, i32), &str> = BTreeMap::new();
            bad.insert((1, 2), "tuple keys have no JSON form");

            let result = cache.set_serialized("bad", &bad);
            assert!(matches!(result, Err(CacheError::Serialization(_))));
            assert!(!cache.exists("bad").unwrap(), "failed set must not write");
        }
    }

    #[test]
    fn test_non_finite_floats_rejected_on_write() {
        #[derive(Serialize)]
        struct Quote {
            ticker: &'static str,
            price: f64,
        }

        for (_dir, cache) in managers() {
            let result = cache.set_serialized(
                "quote",
                &Quote {
                    ticker: "VWCE",
                    price: f64::NAN,
                },
            );
            assert!(matches!(result, Err(CacheError::Serialization(_))));

            assert!(matches!(
                cache.set("inf", f64::INFINITY),
                Err(CacheError::Serialization(_))
            ));
            assert!(matches!(
                cache.set_with_timestamp("weights", vec![0.5, f64::NEG_INFINITY], now_secs()),
                Err(CacheError::Serialization(_))
            ));
            assert!(matches!(
                cache.get_or_set("nan", || f64::NAN),
                Err(CacheError::Serialization(_))
            ));

            assert_eq!(cache.size().unwrap(), 0, "rejected values must not be written");
            assert_eq!(cache.stats().refreshes, 0);
        }
    }

    #[test]
    fn test_non_finite_refresh_keeps_stale_entry() {
        for (_dir, cache) in managers() {
            cache.set_with_timestamp("nav", 98.4, now_secs() - 60.0).unwrap();

            let result = cache.get_or_set_if_stale("nav", || f64::NAN, Duration::from_secs(30));

            assert!(matches!(result, Err(CacheError::Serialization(_))));
            assert_eq!(cache.get("nav").unwrap(), Some(json!(98.4)));
        }
    }

    #[test]
    fn test_non_finite_timestamp_rejected() {
        for (_dir, cache) in managers() {
            for ts in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                assert!(matches!(
                    cache.set_with_timestamp("k", 1, ts),
                    Err(CacheError::InvalidTimestamp(_))
                ));
            }
            assert!(!cache.exists("k").unwrap());

            let written = now_secs() - 60.0;
            cache.set_with_timestamp("k", 1, written).unwrap();
            assert!(cache.set_with_timestamp("k", 2, f64::NAN).is_err());

            assert_eq!(cache.get("k").unwrap(), Some(json!(1)));
            assert_eq!(cache.get_timestamp("k").unwrap(), Some(written));
            assert_eq!(
                cache.freshness("k", Duration::ZERO).unwrap(),
                Freshness::Stale
            );
        }
    }

    #[test]
    fn test_get_as_wrong_shape_is_serialization_error() {
        for (_dir, cache) in managers() {
            cache.set("text", "not a number").unwrap();
            assert!(matches!(
                cache.get_as::<u32>("text"),
                Err(CacheError::Serialization(_))
            ));
        }
    }

    #[test]
    fn test_get_or_set() {
        for (_dir, cache) in managers() {
            let val = cache.get_or_set("computed", || "new_value").unwrap();
            assert_eq!(val, json!("new_value"));

            let val = cache.get_or_set("computed", || "other").unwrap();
            assert_eq!(val, json!("new_value"));
            assert_eq!(cache.stats().refreshes, 1);
        }
    }

    #[test]
    fn test_try_get_or_set_factory_error_writes_nothing() {
        #[derive(Debug)]
        enum FetchError {
            Offline,
            Cache(CacheError),
        }
        impl From<CacheError> for FetchError {
            fn from(err: CacheError) -> Self {
                FetchError::Cache(err)
            }
        }

        for (_dir, cache) in managers() {
            let result: std::result::Result<CacheValue, FetchError> =
                cache.try_get_or_set("quote", || Err::<CacheValue, _>(FetchError::Offline));

            assert!(matches!(result, Err(FetchError::Offline)));
            assert!(!cache.exists("quote").unwrap());

            let value = cache
                .try_get_or_set("quote", || Ok::<_, FetchError>(json!(101.5)))
                .unwrap();
            assert_eq!(value, json!(101.5));
        }
    }

    #[test]
    fn test_is_expired_and_get_if_fresh() {
        for (_dir, cache) in managers() {
            cache.set("temp", "abc").unwrap();
            sleep(Duration::from_millis(50));

            assert!(cache.is_expired("temp", Duration::from_millis(10)).unwrap());
            assert!(!cache.is_expired("temp", Duration::from_secs(100)).unwrap());
            assert!(cache.is_expired("missing", Duration::from_secs(100)).unwrap());

            assert_eq!(
                cache.get_if_fresh("temp", Duration::from_secs(100)).unwrap(),
                Some(json!("abc"))
            );
            assert_eq!(cache.get_if_fresh("temp", Duration::from_millis(10)).unwrap(), None);
            assert_eq!(
                cache
                    .get_if_fresh_or("temp", Duration::from_millis(10), "DEFAULT")
                    .unwrap(),
                json!("DEFAULT")
            );
        }
    }

    #[test]
    fn test_freshness_states() {
        for (_dir, cache) in managers() {
            let ttl = Duration::from_secs(5);
            assert_eq!(cache.freshness("k", ttl).unwrap(), Freshness::Absent);

            cache.set("k", 1).unwrap();
            assert_eq!(cache.freshness("k", ttl).unwrap(), Freshness::Fresh);

            cache.set_with_timestamp("k", 1, now_secs() - 10.0).unwrap();
            assert_eq!(cache.freshness("k", ttl).unwrap(), Freshness::Stale);
        }
    }

    #[test]
    fn test_get_or_set_if_stale() {
        for (_dir, cache) in managers() {
            cache.set("temp", "abc").unwrap();
            sleep(Duration::from_millis(50));

            let val = cache
                .get_or_set_if_stale("temp", || "refreshed", Duration::from_millis(10))
                .unwrap();
            assert_eq!(val, json!("refreshed"));
            assert!(cache.get_age("temp").unwrap().unwrap() < 0.05);
        }
    }

    #[test]
    fn test_get_or_set_if_stale_fresh_skips_factory() {
        for (_dir, cache) in managers() {
            let calls = Cell::new(0);
            let ttl = Duration::from_secs(300);
            let load = || {
                calls.set(calls.get() + 1);
                json!({"id": 456, "name": "User 456"})
            };

            let first = cache.get_or_set_if_stale("profile:456", load, ttl).unwrap();
            let ts = cache.get_timestamp("profile:456").unwrap();
            let second = cache.get_or_set_if_stale("profile:456", load, ttl).unwrap();

            assert_eq!(first, second);
            assert_eq!(calls.get(), 1);
            assert_eq!(cache.get_timestamp("profile:456").unwrap(), ts, "fresh read must not write");
        }
    }

    #[test]
    fn test_try_get_or_set_if_stale_error_keeps_stale_entry() {
        for (_dir, cache) in managers() {
            cache.set_with_timestamp("rate", 1.1, now_secs() - 60.0).unwrap();

            let result = cache.try_get_or_set_if_stale(
                "rate",
                || Err::<CacheValue, CacheError>(CacheError::Configuration("down".into())),
                Duration::from_secs(30),
            );

            assert!(result.is_err());
            assert_eq!(cache.get("rate").unwrap(), Some(json!(1.1)));
        }
    }

    #[test]
    fn test_cleanup_expired_keys() {
        for (_dir, cache) in managers() {
            cache.set_with_timestamp("old1", "x", now_secs() - 60.0).unwrap();
            cache.set_with_timestamp("old2", "y", now_secs() - 60.0).unwrap();
            cache.set("fresh", "z").unwrap();

            let removed = cache.cleanup_expired_keys(Duration::from_secs(30)).unwrap();

            assert_eq!(removed, 2);
            assert_eq!(cache.keys().unwrap(), HashSet::from(["fresh".to_string()]));
        }
    }

    #[test]
    fn test_cleanup_old_entries_delegates() {
        let cache = CacheManager::memory();
        cache.set_with_timestamp("ancient", 1, now_secs() - 40.0 * 86_400.0).unwrap();
        cache.set("recent", 2).unwrap();

        assert_eq!(cache.cleanup_old_entries(30).unwrap(), 1);
        assert!(cache.exists("recent").unwrap());
    }

    #[test]
    fn test_stats_track_lookups() {
        let cache = CacheManager::memory();
        let ttl = Duration::from_secs(5);

        cache.set("a", 1).unwrap();
        cache.set_with_timestamp("old", 1, now_secs() - 10.0).unwrap();

        cache.get("a").unwrap(); // hit
        cache.get("missing").unwrap(); // miss
        cache.get_if_fresh("old", ttl).unwrap(); // stale

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.refreshes, 0);
    }

    #[test]
    fn test_stats_count_value_reads_only() {
        for (_dir, cache) in managers() {
            let ttl = Duration::from_secs(5);
            cache.set("a", 1).unwrap();

            cache.get_with_info("a").unwrap(); // hit
            cache.get_with_info_or("missing", 0).unwrap(); // miss
            cache.freshness("a", ttl).unwrap();
            cache.is_expired("missing", ttl).unwrap();
            cache.exists("a").unwrap();
            cache.get_age("a").unwrap();

            let stats = cache.stats();
            assert_eq!((stats.hits, stats.misses, stats.stale), (1, 1, 0));
        }
    }

    #[test]
    fn test_debug_shows_backend() {
        let cache = CacheManager::memory();
        let rendered = format!("{:?}", cache);
        assert!(rendered.contains("memory"));
    }
}
