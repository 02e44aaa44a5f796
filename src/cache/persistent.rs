//! Persistent Store Module
//!
//! Durable backend: one SQLite file holding JSON-encoded values with write and
//! first-seen timestamps.
//!
//! Every operation runs inside its own scoped connection: the store mutex is taken,
//! a connection is opened, a transaction begins, and the transaction commits only
//! if the operation succeeded. Dropping the transaction guard on an error path rolls
//! it back, and the connection closes when it goes out of scope.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

use crate::cache::backend::Store;
use crate::cache::entry::{age_since, check_timestamp, now_secs};
use crate::cache::{CacheValue, EntryInfo};
use crate::config::DEFAULT_BUSY_TIMEOUT_MS;
use crate::error::{CacheError, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache (
        key TEXT PRIMARY KEY,
        value BLOB NOT NULL,
        timestamp REAL NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_timestamp ON cache(timestamp);
    CREATE INDEX IF NOT EXISTS idx_created_at ON cache(created_at);
";

// created_at is the first write time; overwrites touch value and timestamp only.
const UPSERT: &str = "
    INSERT INTO cache (key, value, timestamp, created_at)
    VALUES (?1, ?2, ?3, datetime(?3, 'unixepoch'))
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, timestamp = excluded.timestamp
";

// == Persistent Store ==
/// SQLite-backed cache storage.
#[derive(Debug)]
pub struct PersistentStore {
    /// Database file location
    path: PathBuf,
    /// How long a connection waits on a locked database
    busy_timeout: Duration,
    /// Serializes connections opened by this instance
    lock: Mutex<()>,
}

impl PersistentStore {
    // == Constructor ==
    /// Opens (or creates) the cache database at `path` with the default busy timeout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
    }

    /// Opens (or creates) the cache database at `path`.
    ///
    /// The path is validated before anything touches the disk, then the schema is
    /// created if missing.
    ///
    /// # Errors
    /// - `Configuration` if the path is empty, in-memory, a directory, or its parent
    ///   directory does not exist
    /// - `Storage` if the file cannot be opened or initialized
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        validate_storage_path(&path)?;

        let store = Self {
            path,
            busy_timeout,
            lock: Mutex::new(()),
        };
        store.with_transaction(|tx| {
            tx.execute_batch(SCHEMA)?;
            Ok(())
        })?;

        info!(path = %store.path.display(), "persistent cache opened");
        Ok(store)
    }

    /// Database file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Connection Scope ==
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    /// Runs `f` in a transaction on a fresh connection, committing on success.
    fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock();
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn read_timestamp(&self, key: &str) -> Result<Option<f64>> {
        self.with_transaction(|tx| {
            let timestamp = tx
                .query_row(
                    "SELECT timestamp FROM cache WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, f64>(0),
                )
                .optional()?;
            Ok(timestamp)
        })
    }
}

impl Store for PersistentStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn is_persistent(&self) -> bool {
        true
    }

    fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let blob = self.with_transaction(|tx| {
            let blob = tx
                .query_row(
                    "SELECT value FROM cache WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?;
            Ok(blob)
        })?;

        blob.map(|bytes| decode(&bytes)).transpose()
    }

    fn get_with_info(&self, key: &str) -> Result<Option<EntryInfo>> {
        let row = self.with_transaction(|tx| {
            let row = tx
                .query_row(
                    "SELECT value, timestamp FROM cache WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, f64>(1)?)),
                )
                .optional()?;
            Ok(row)
        })?;

        match row {
            Some((bytes, timestamp)) => Ok(Some(EntryInfo {
                value: decode(&bytes)?,
                timestamp: Some(timestamp),
                age_seconds: Some(age_since(timestamp)),
            })),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: CacheValue) -> Result<()> {
        self.set_with_timestamp(key, value, now_secs())
    }

    fn set_with_timestamp(&self, key: &str, value: CacheValue, timestamp: f64) -> Result<()> {
        check_timestamp(timestamp)?;
        // Encode before touching the database so a bad value never starts a write.
        let blob = encode(&value)?;
        self.with_transaction(|tx| {
            tx.execute(UPSERT, params![key, blob, timestamp])?;
            Ok(())
        })?;

        debug!(key, bytes = blob.len(), "sqlite set");
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.with_transaction(|tx| {
            let found = tx
                .query_row(
                    "SELECT 1 FROM cache WHERE key = ?1 LIMIT 1",
                    params![key],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.with_transaction(|tx| {
            Ok(tx.execute("DELETE FROM cache WHERE key = ?1", params![key])?)
        })?;

        debug!(key, removed, "sqlite delete");
        Ok(removed > 0)
    }

    fn clear(&self) -> Result<()> {
        let removed =
            self.with_transaction(|tx| Ok(tx.execute("DELETE FROM cache", [])?))?;

        debug!(removed, "sqlite clear");
        Ok(())
    }

    fn keys(&self) -> Result<HashSet<String>> {
        self.with_transaction(|tx| {
            let mut stmt = tx.prepare("SELECT key FROM cache")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<HashSet<String>>>()?;
            Ok(keys)
        })
    }

    fn size(&self) -> Result<usize> {
        let count = self.with_transaction(|tx| {
            Ok(tx.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get::<_, i64>(0))?)
        })?;
        Ok(count.max(0) as usize)
    }

    fn get_age(&self, key: &str) -> Result<Option<f64>> {
        Ok(self.read_timestamp(key)?.map(age_since))
    }

    fn get_timestamp(&self, key: &str) -> Result<Option<f64>> {
        self.read_timestamp(key)
    }

    fn cleanup_old_entries(&self, days: u32) -> Result<usize> {
        let modifier = format!("-{} days", days);
        let removed = self.with_transaction(|tx| {
            Ok(tx.execute(
                "DELETE FROM cache WHERE created_at < datetime('now', ?1)",
                params![modifier],
            )?)
        })?;

        info!(days, removed, "sqlite retention sweep");
        Ok(removed)
    }
}

// == Encoding ==
/// Compact UTF-8 JSON text, stored as a blob.
fn encode(value: &CacheValue) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode(bytes: &[u8]) -> Result<CacheValue> {
    Ok(serde_json::from_slice(bytes)?)
}

// == Path Validation ==
fn validate_storage_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(CacheError::Configuration(
            "storage path must not be empty".to_string(),
        ));
    }
    // Each operation opens its own connection, so a private in-memory database
    // would be empty on every call.
    if path.as_os_str() == ":memory:" {
        return Err(CacheError::Configuration(
            "in-memory SQLite is not supported, use the memory backend".to_string(),
        ));
    }

    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {
            return Err(CacheError::Configuration(format!(
                "storage path {} is a directory",
                path.display()
            )))
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(CacheError::Configuration(format!(
                "parent directory {} does not exist",
                parent.display()
            )));
        }
    }

    Ok(())
}
