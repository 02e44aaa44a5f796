//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
///
/// A missing key is never an error: lookups return `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be encoded to, or decoded from, JSON text
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing database could not be opened, read or written
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem error while inspecting the storage location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Explicit write timestamp that is NaN or infinite
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    /// Invalid construction parameters
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
