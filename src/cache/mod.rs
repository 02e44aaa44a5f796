//! Cache Module
//!
//! Timestamped key-value caching over an in-memory or SQLite backend, with TTL helpers.

mod backend;
mod entry;
mod flight;
mod manager;
mod memory;
mod persistent;
mod stats;
mod value;


// Re-export public types
pub use backend::Store;
pub use entry::{now_secs, CacheEntry, EntryInfo};
pub use flight::InFlight;
pub use manager::{CacheManager, Freshness};
pub use memory::MemoryStore;
pub use persistent::PersistentStore;
pub use stats::CacheStats;
pub use value::to_cache_value;

/// The closed value model every backend stores: null, booleans, numbers, strings,
/// arrays and string-keyed objects.
pub type CacheValue = serde_json::Value;

// == Public Constants ==
/// Seconds in one retention day
pub const SECONDS_PER_DAY: f64 = 86_400.0;
