//! Fresh Cache - An embedded key-value cache with entry timestamps
//!
//! One interface over a volatile in-memory store and a durable SQLite store, with
//! per-entry age tracking, TTL helpers and cache-aside refresh.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheManager, CacheValue, EntryInfo, Freshness};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::{spawn_sweep_task, SweepPolicy};
