//! In-Flight Registry Module
//!
//! Per-key locks that serialize cache fills for the same key, so concurrent misses
//! collapse into a single factory call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

// == In-Flight Registry ==
/// Tracks keys whose value is currently being computed.
///
/// Slots are created on demand and dropped by the last caller to leave them, so the
/// map only holds keys with a fill in progress or waiting.
#[derive(Debug, Default)]
pub struct InFlight {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InFlight {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Run ==
    /// Runs `f` while holding the lock for `key`.
    ///
    /// Callers for the same key run one after another; callers for different keys
    /// do not block each other. `f` should re-check the cache before computing,
    /// since an earlier holder may already have filled it.
    pub fn run<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        // Dropped after the slot guard below, including on unwind.
        let _release = Release {
            flights: self,
            key,
            slot: &slot,
        };
        let _guard = slot.lock();
        f()
    }

    /// Number of keys with a fill in progress or waiting.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

/// Removes the slot once no other caller holds it.
struct Release<'a> {
    flights: &'a InFlight,
    key: &'a str,
    slot: &'a Arc<Mutex<()>>,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        let mut slots = self.flights.slots.lock();
        // One reference in the map, one held by this caller.
        if Arc::strong_count(self.slot) == 2 {
            slots.remove(self.key);
        }
    }
}
