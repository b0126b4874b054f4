//! In-process cache backend: a capped, insertion-ordered map.

use std::sync::Mutex;

use indexmap::IndexMap;
use tracing::debug;

use crate::record::CacheRecord;
use crate::store::{CacheStore, DEFAULT_MAX_ENTRIES};

/// A mutex-guarded [`IndexMap`] that preserves insertion order.
///
/// Re-inserting an existing key re-dates it: the old entry is removed and
/// the new one appended at the back, so eviction order tracks recency of
/// writes without consulting timestamps.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<IndexMap<String, CacheRecord>>,
    max_entries: usize,
}

impl MemoryStore {
    /// Creates a store keeping at most `max_entries` records.
    pub fn new(max_entries: usize) -> Self {
        Self { entries: Mutex::new(IndexMap::new()), max_entries }
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    /// True when no records are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, url: &str) -> Option<CacheRecord> {
        self.entries.lock().expect("cache mutex poisoned").get(url).cloned()
    }

    fn set(&self, url: &str, record: CacheRecord) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        // delete-then-insert keeps the map ordered by last write
        entries.shift_remove(url);
        entries.insert(url.to_string(), record);
    }

    fn trim(&self) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let overflow = entries.len().saturating_sub(self.max_entries);
        for _ in 0..overflow {
            entries.shift_remove_index(0);
        }
        if overflow > 0 {
            debug!(evicted = overflow, kept = entries.len(), "trimmed in-memory cache");
        }
    }
}
