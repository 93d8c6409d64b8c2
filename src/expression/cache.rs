// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded, thread-safe LRU cache for parsed expressions
//!
//! Values are computed on miss by a caller supplied function. The function
//! runs without holding the cache lock, so a slow computation for one key
//! never blocks lookups of unrelated keys. Two threads missing on the same
//! key may both compute; the first value inserted is retained and returned
//! to both. Failed computations are never cached.

use lru::LruCache;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of parsed expressions retained by default
pub const DEFAULT_EXPRESSION_CACHE_CAPACITY: usize = 256;

/// Cache performance metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to compute a value
    pub misses: u64,
    /// Values inserted after a successful computation
    pub insertions: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Current number of entries
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

impl CacheStats {
    /// Hit ratio between 0.0 and 1.0
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Fill ratio between 0.0 and 1.0
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.entries as f64 / self.capacity as f64
        }
    }
}

/// Fixed-capacity LRU cache safe for concurrent use
pub struct ConcurrentLruCache<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, V>>,
    capacity: NonZeroUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
}

impl<K: Hash + Eq, V: Clone> ConcurrentLruCache<K, V> {
    /// Create a cache holding at most `capacity` entries; zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Maximum number of entries, fixed at construction
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Cached value for the key, marking it most recently used
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.inner.lock().get(key).cloned();
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    /// Whether the key is cached; does not affect recency
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().contains(key)
    }

    /// Cached value for the key, computing and inserting it on miss.
    ///
    /// Errors from `compute` are returned as-is and leave the cache untouched.
    pub fn get_or_try_insert_with<Q, E, F>(&self, key: &Q, compute: F) -> Result<V, E>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(&Q) -> Result<V, E>,
    {
        if let Some(value) = self.inner.lock().get(key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let computed = compute(key)?;

        let mut cache = self.inner.lock();
        if let Some(existing) = cache.get(key) {
            // Lost a race against a concurrent miss; the retained value is canonical.
            return Ok(existing.clone());
        }
        // The key is absent here, so anything `push` hands back is an eviction.
        if cache.push(key.to_owned(), computed.clone()).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            log::trace!(
                "Cache at capacity {}, evicted least recently used entry",
                self.capacity
            );
        }
        self.insertions.fetch_add(1, Ordering::Relaxed);
        Ok(computed)
    }

    /// Infallible variant of [`Self::get_or_try_insert_with`]
    pub fn get_or_insert_with<Q, F>(&self, key: &Q, compute: F) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(&Q) -> V,
    {
        match self.get_or_try_insert_with(key, |k| Ok::<V, std::convert::Infallible>(compute(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Remove a single entry
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().pop(key)
    }

    /// Drop every entry; statistics are kept
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Snapshot of the cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
            capacity: self.capacity(),
        }
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for ConcurrentLruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentLruCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.inner.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn ok(value: &str) -> Result<String, String> {
        Ok(value.to_uppercase())
    }

    #[test]
    fn test_compute_once_per_key() {
        let cache: ConcurrentLruCache<String, String> = ConcurrentLruCache::new(4);
        let calls = AtomicUsize::new(0);
        let counted = |key: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            ok(key)
        };

        assert_eq!(cache.get_or_try_insert_with("1+1", counted).unwrap(), "1+1");
        assert_eq!(cache.get_or_try_insert_with("1+1", counted).unwrap(), "1+1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_failure_not_cached() {
        let cache: ConcurrentLruCache<String, String> = ConcurrentLruCache::new(4);
        let calls = AtomicUsize::new(0);

        let failing = |_: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<String, _>("boom".to_string())
        };
        assert_eq!(cache.get_or_try_insert_with("bad", failing), Err("boom".to_string()));
        assert_eq!(cache.get_or_try_insert_with("bad", failing), Err("boom".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());

        // Once the input parses, it is cached as usual
        assert_eq!(cache.get_or_try_insert_with("bad", ok).unwrap(), "BAD");
        assert!(cache.contains("bad"));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache: ConcurrentLruCache<String, usize> = ConcurrentLruCache::new(256);
        for i in 0..256 {
            cache.get_or_insert_with(format!("k{i}").as_str(), |_| i);
        }
        assert_eq!(cache.len(), 256);

        cache.get_or_insert_with("k256", |_| 256);

        assert_eq!(cache.len(), 256);
        assert!(!cache.contains("k0"));
        assert!(cache.contains("k1"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_access_refreshes_recency() {
        let cache: ConcurrentLruCache<String, usize> = ConcurrentLruCache::new(3);
        cache.get_or_insert_with("a", |_| 1);
        cache.get_or_insert_with("b", |_| 2);
        cache.get_or_insert_with("c", |_| 3);

        // Touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get("a"), Some(1));
        cache.get_or_insert_with("d", |_| 4);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_contains_does_not_refresh() {
        let cache: ConcurrentLruCache<String, usize> = ConcurrentLruCache::new(2);
        cache.get_or_insert_with("a", |_| 1);
        cache.get_or_insert_with("b", |_| 2);
        assert!(cache.contains("a"));
        cache.get_or_insert_with("c", |_| 3);
        assert!(!cache.contains("a"));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache: ConcurrentLruCache<String, usize> = ConcurrentLruCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.get_or_insert_with("a", |_| 1);
        cache.get_or_insert_with("b", |_| 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache: ConcurrentLruCache<String, usize> = ConcurrentLruCache::new(4);
        cache.get_or_insert_with("a", |_| 1);
        cache.get_or_insert_with("b", |_| 2);
        assert_eq!(cache.remove("a"), Some(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().utilization(), 0.0);
    }

    #[test]
    fn test_concurrent_misses_converge() {
        let cache: Arc<ConcurrentLruCache<String, Arc<String>>> =
            Arc::new(ConcurrentLruCache::new(16));
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_insert_with("shared", |k| Arc::new(format!("{k}-{i}")))
                })
            })
            .collect();

        let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let retained = cache.get("shared").unwrap();
        assert_eq!(cache.len(), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &retained)));
    }

    #[test]
    fn test_stats_ratios() {
        let cache: ConcurrentLruCache<String, usize> = ConcurrentLruCache::new(4);
        cache.get_or_insert_with("a", |_| 1);
        cache.get("a");
        let stats = cache.stats();
        assert_eq!(stats.hit_ratio(), 0.5);
        assert_eq!(stats.utilization(), 0.25);
        assert_eq!(stats.insertions, 1);
    }
}
