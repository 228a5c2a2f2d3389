//! Entity Map Module
//!
//! A concurrent key/value mirror of one table's worth of state. Each map is
//! sharded internally, so lookups on unrelated keys never contend and no lock
//! is ever shared between two maps.

use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::cache::{CacheStats, StatsCounter};

// == Entity Map ==
/// Unbounded concurrent mapping with no eviction.
///
/// Values are replaced wholesale on [`EntityMap::set`]; a reader racing a
/// writer sees either the old or the new value, never a mix of both.
#[derive(Debug)]
pub struct EntityMap<K, V>
where
    K: Hash + Eq,
{
    entries: DashMap<K, V>,
    stats: StatsCounter,
}

impl<K, V> Default for EntityMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EntityMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stats: StatsCounter::new(),
        }
    }

    /// Creates a map sized for `capacity` entries, used by the loader once it
    /// knows how many rows it is about to seed.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            stats: StatsCounter::new(),
        }
    }

    // == Get ==
    /// Returns a copy of the value stored under `key`, or `None` when the key
    /// was never seeded.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value().clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    // == Set Once ==
    /// Stores `value` only if `key` is vacant.
    ///
    /// Returns `false` and leaves the existing value untouched otherwise.
    pub fn set_once(&self, key: K, value: V) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len())
    }
}

impl<K> EntityMap<K, u64>
where
    K: Hash + Eq + Clone,
{
    // == Increment ==
    /// Adds one to the counter under `key` and returns the new value, or
    /// `None` if the counter was never seeded.
    ///
    /// This is a plain read-modify-write against the in-memory value: the read
    /// and the store take the shard lock separately, so two threads
    /// incrementing the same key at once can both read `n` and both store
    /// `n + 1`. Counters are best-effort; one lost update under contention is
    /// tolerated.
    pub fn increment(&self, key: &K) -> Option<u64> {
        let next = self.get(key)? + 1;
        self.set(key.clone(), next);
        Some(next)
    }
}
