//! # Session LRU Cache
//!
//! Bounded map in front of the sessions table. Every authenticated request
//! resolves its cookie token; hot tokens are answered from memory instead of
//! opening a read transaction.
//!
//! Recency is tracked with a logical clock (a monotonic counter), so
//! eviction order never depends on wall time.

use serde::Serialize;
use std::collections::BTreeMap;

/// Default eviction batch (entries dropped when the cache is full).
pub const DEFAULT_EVICTION_BATCH: usize = 1;

// =============================================================================
// CACHE ENTRY
// =============================================================================

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    last_access: u64,
}

// =============================================================================
// LRU CACHE
// =============================================================================

/// Least-recently-used cache with hit/miss counters.
#[derive(Debug)]
pub struct LruCache<K: Ord + Clone, V: Clone> {
    slots: BTreeMap<K, Slot<V>>,
    capacity: usize,
    eviction_batch: usize,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Ord + Clone, V: Clone> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: BTreeMap::new(),
            capacity: capacity.max(1),
            eviction_batch: DEFAULT_EVICTION_BATCH,
            clock: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Drop `batch` entries at a time when full.
    #[must_use]
    pub fn with_eviction_batch(mut self, batch: usize) -> Self {
        self.eviction_batch = batch.max(1);
        self
    }

    fn tick(&mut self) -> u64 {
        self.clock = self.clock.saturating_add(1);
        self.clock
    }

    /// Look up a key, refreshing its recency on a hit.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.tick();
        match self.slots.get_mut(key) {
            Some(slot) => {
                slot.last_access = now;
                self.hits = self.hits.saturating_add(1);
                Some(slot.value.clone())
            }
            None => {
                self.misses = self.misses.saturating_add(1);
                None
            }
        }
    }

    /// Look up a key without touching recency or statistics.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    /// Insert or replace a value, evicting the oldest entries if full.
    pub fn insert(&mut self, key: K, value: V) {
        let now = self.tick();
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.value = value;
            slot.last_access = now;
            return;
        }
        if self.slots.len() >= self.capacity {
            self.evict();
        }
        self.slots.insert(
            key,
            Slot {
                value,
                last_access: now,
            },
        );
    }

    /// Remove one key.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.slots.remove(key).map(|slot| slot.value)
    }

    /// Remove every entry whose value matches `predicate`.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&V) -> bool) {
        self.slots.retain(|_, slot| !predicate(&slot.value));
    }

    /// Drop all entries. Statistics are kept.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits.saturating_add(self.misses);
        let hit_rate_percent = if lookups == 0 {
            0
        } else {
            u8::try_from(self.hits.saturating_mul(100) / lookups).unwrap_or(100)
        };
        CacheStats {
            size: self.slots.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            hit_rate_percent,
        }
    }

    fn evict(&mut self) {
        let mut by_age: Vec<(u64, K)> = self
            .slots
            .iter()
            .map(|(key, slot)| (slot.last_access, key.clone()))
            .collect();
        by_age.sort_by_key(|(age, _)| *age);

        for (_, key) in by_age.into_iter().take(self.eviction_batch) {
            self.slots.remove(&key);
            self.evictions = self.evictions.saturating_add(1);
        }
    }
}

// =============================================================================
// CACHE STATISTICS
// =============================================================================

/// Counters reported by `menagerie status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Integer percentage, 0-100.
    pub hit_rate_percent: u8,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut cache = LruCache::new(4);
        cache.insert("a".to_string(), 1u64);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);
    }

    #[test]
    fn least_recent_entry_is_evicted() {
        let mut cache = LruCache::new(3);
        cache.insert(1u64, "a");
        cache.insert(2u64, "b");
        cache.insert(3u64, "c");

        let _ = cache.get(&1);
        let _ = cache.get(&2);
        cache.insert(4u64, "d");

        assert!(cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(!cache.contains(&3));
        assert!(cache.contains(&4));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn replacing_a_key_does_not_evict() {
        let mut cache = LruCache::new(2);
        cache.insert(1u64, "a");
        cache.insert(2u64, "b");
        cache.insert(1u64, "z");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek(&1), Some(&"z"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn batch_eviction() {
        let mut cache = LruCache::new(4).with_eviction_batch(2);
        for key in 0u64..4 {
            cache.insert(key, key);
        }
        cache.insert(9, 9);
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&0));
        assert!(!cache.contains(&1));
    }

    #[test]
    fn stats_count_hits_and_misses() {
        let mut cache = LruCache::<u64, &str>::new(10);
        cache.insert(1, "a");
        let _ = cache.get(&1);
        let _ = cache.get(&2);
        let _ = cache.get(&1);
        let _ = cache.get(&3);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hit_rate_percent, 50);
    }

    #[test]
    fn peek_leaves_stats_alone() {
        let mut cache = LruCache::new(10);
        cache.insert(1u64, "value");
        let before = cache.stats();
        let _ = cache.peek(&1);
        let _ = cache.peek(&2);
        assert_eq!(before, cache.stats());
    }

    #[test]
    fn remove_where_filters_values() {
        let mut cache = LruCache::new(10);
        cache.insert("t1".to_string(), 7u64);
        cache.insert("t2".to_string(), 8u64);
        cache.insert("t3".to_string(), 7u64);

        cache.remove_where(|user| *user == 7);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&"t2".to_string()));
    }

    #[test]
    fn clear_keeps_counters() {
        let mut cache = LruCache::new(10);
        cache.insert(1u64, 1u64);
        let _ = cache.get(&1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
    }
}
