//! Configuration Module
//!
//! Handles loading and validating cache construction parameters from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default SQLite file used by the persistent backend.
pub const DEFAULT_STORAGE_PATH: &str = "cache.db";

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

/// Default retention window for the persistent sweep, in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Use the SQLite-backed store instead of the in-memory one
    pub use_persistent: bool,
    /// Location of the SQLite file (persistent backend only)
    pub storage_path: PathBuf,
    /// How long a connection waits on a locked database, in milliseconds
    pub busy_timeout_ms: u64,
    /// Entries first seen longer ago than this are removed by the retention sweep
    pub retention_days: u32,
    /// TTL in seconds used by the background expiry sweep, 0 = disabled
    pub expiry_ttl: u64,
    /// Background sweep interval in seconds, 0 = no background task
    pub sweep_interval: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_PERSISTENT` - `true`/`1` selects the SQLite backend (default: false)
    /// - `CACHE_DB_PATH` - SQLite file location (default: cache.db)
    /// - `CACHE_BUSY_TIMEOUT_MS` - Busy timeout in milliseconds (default: 30000)
    /// - `CACHE_RETENTION_DAYS` - Retention window in days (default: 30)
    /// - `CACHE_EXPIRY_TTL` - Expiry sweep TTL in seconds (default: 0, disabled)
    /// - `CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 0, disabled)
    pub fn from_env() -> Self {
        Self {
            use_persistent: env::var("CACHE_PERSISTENT")
                .ok()
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            storage_path: env::var("CACHE_DB_PATH")
                .ok()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH)),
            busy_timeout_ms: env::var("CACHE_BUSY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            retention_days: env::var("CACHE_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETENTION_DAYS),
            expiry_ttl: env::var("CACHE_EXPIRY_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }

    /// Busy timeout as a `Duration`.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Checks that the parameters describe a usable cache.
    ///
    /// Only the persistent backend has a storage path to validate; the path itself is
    /// probed again when the store is opened.
    pub fn validate(&self) -> Result<()> {
        if self.use_persistent && self.storage_path.as_os_str().is_empty() {
            return Err(CacheError::Configuration(
                "storage path must not be empty".to_string(),
            ));
        }
        if self.busy_timeout_ms == 0 {
            return Err(CacheError::Configuration(
                "busy timeout must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval > 0 && self.expiry_ttl == 0 && !self.use_persistent {
            return Err(CacheError::Configuration(
                "background sweep on the memory backend needs CACHE_EXPIRY_TTL".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            use_persistent: false,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            retention_days: DEFAULT_RETENTION_DAYS,
            expiry_ttl: 0,
            sweep_interval: 0,
        }
    }
}
