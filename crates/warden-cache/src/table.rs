use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::{
    key::{CacheKey, KeyArgs},
    stats::{CacheStats, CacheStatsSnapshot},
};

/// Bounded key/value table behind a memoized function.
///
/// The mutex guards the table only; it is released before any value is
/// computed, so callers never hold it across a suspension point.
#[derive(Debug)]
pub struct MemoCache<V> {
    name: &'static str,
    entries: Mutex<LruCache<String, V>>,
    stats: CacheStats,
}

impl<V> MemoCache<V> {
    /// Creates a table holding at most `capacity` entries. A capacity of zero
    /// is treated as one.
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    #[must_use]
    pub fn key_for<A: KeyArgs + ?Sized>(&self, args: &A) -> CacheKey {
        CacheKey::build(self.name, args)
    }

    /// Stores `value`, evicting the least recently used entry when full.
    pub fn insert(&self, key: CacheKey, value: V) {
        let raw = key.into_string();
        let evicted = {
            let mut entries = self.entries.lock();
            match entries.push(raw.clone(), value) {
                Some((old_key, _)) if old_key != raw => Some(old_key),
                _ => None,
            }
        };
        if let Some(evicted) = evicted {
            self.stats.record_eviction();
            tracing::debug!(event = "cache.evict", cache = self.name, key = %evicted);
        }
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains(key.as_str())
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        let removed = self.entries.lock().pop(key.as_str()).is_some();
        if removed {
            self.stats.record_invalidations(1);
            tracing::debug!(event = "cache.invalidate", cache = self.name, key = %key);
        }
        removed
    }

    /// Removes every entry whose key text contains `needle`.
    pub fn remove_containing(&self, needle: &str) -> usize {
        let removed = {
            let mut entries = self.entries.lock();
            let stale: Vec<String> = entries
                .iter()
                .filter(|(key, _)| key.contains(needle))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &stale {
                entries.pop(key.as_str());
            }
            stale.len()
        };
        if removed > 0 {
            self.stats.record_invalidations(removed as u64);
            tracing::debug!(
                event = "cache.invalidate_containing",
                cache = self.name,
                needle,
                removed
            );
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

impl<V: Clone> MemoCache<V> {
    /// Looks `key` up, marking it most recently used on a hit.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let value = self.entries.lock().get(key.as_str()).cloned();
        if value.is_some() {
            self.stats.record_hit();
            tracing::trace!(event = "cache.hit", cache = self.name, key = %key);
        } else {
            self.stats.record_miss();
            tracing::trace!(event = "cache.miss", cache = self.name, key = %key);
        }
        value
    }
}
