//! In-memory TTL cache with LRU eviction and a stale window
//!
//! Entries move through three phases:
//! - **fresh**: younger than the TTL and not expired by hand
//! - **stale**: past the TTL (or expired) but younger than `max_stale`,
//!   still readable through [`TtlCache::get_any`] as a fallback
//! - **evicted**: older than `max_stale`, dropped on the next write
//!
//! Time is measured with [`tokio::time::Instant`] so tests can drive it with
//! a paused clock.
//!
//! # Example
//!
//! ```rust
//! use shopverse_core::cache::{TtlCache, TtlCacheConfig};
//! use std::time::Duration;
//!
//! let cache = TtlCache::new(TtlCacheConfig {
//!     ttl: Duration::from_secs(600),
//!     max_stale: Duration::from_secs(1800),
//!     capacity: 64,
//! });
//!
//! cache.insert("home->store", 42u32);
//! assert_eq!(cache.get_fresh(&"home->store"), Some(42));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlCacheConfig {
    /// How long an entry counts as fresh
    pub ttl: Duration,
    /// Maximum age after which an entry is evicted entirely
    pub max_stale: Duration,
    /// Maximum number of entries (least recently used evicted first)
    pub capacity: usize,
}

impl Default for TtlCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10 * 60),
            max_stale: Duration::from_secs(30 * 60),
            capacity: 64,
        }
    }
}

/// A value read from the cache together with its age
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    /// The cached value
    pub value: V,
    /// Time since the value was inserted
    pub age: Duration,
    /// Whether the value is still within its TTL
    pub fresh: bool,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
    last_access: u64,
    expired: bool,
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    tick: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total entries held, fresh or stale
    pub entries: usize,
    /// Entries still within TTL
    pub fresh: usize,
}

/// Thread-safe TTL + LRU cache
#[derive(Debug)]
pub struct TtlCache<K, V> {
    config: TtlCacheConfig,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache
    pub fn new(config: TtlCacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
            }),
        }
    }

    /// Get the active configuration
    pub fn config(&self) -> &TtlCacheConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        !entry.expired && now.duration_since(entry.inserted_at) < self.config.ttl
    }

    /// Get a value only if it is still fresh
    pub fn get_fresh(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let entry = inner.entries.get_mut(key)?;
        if !self.is_fresh(entry, now) {
            return None;
        }
        entry.last_access = tick;
        Some(entry.value.clone())
    }

    /// Get a value whether fresh or stale, as long as it has not outlived
    /// the stale window
    pub fn get_any(&self, key: &K) -> Option<Cached<V>> {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let entry = inner.entries.get_mut(key)?;
        let age = now.duration_since(entry.inserted_at);
        if age > self.config.max_stale {
            return None;
        }
        entry.last_access = tick;
        Some(Cached {
            value: entry.value.clone(),
            age,
            fresh: self.is_fresh(entry, now),
        })
    }

    /// Find the youngest entry whose key matches `predicate`
    pub fn latest_where<P>(&self, predicate: P) -> Option<Cached<V>>
    where
        P: Fn(&K) -> bool,
    {
        let now = Instant::now();
        let inner = self.lock();

        inner
            .entries
            .iter()
            .filter(|(k, _)| predicate(k))
            .map(|(_, e)| (e, now.duration_since(e.inserted_at)))
            .filter(|(_, age)| *age <= self.config.max_stale)
            .min_by_key(|(_, age)| *age)
            .map(|(e, age)| Cached {
                value: e.value.clone(),
                age,
                fresh: self.is_fresh(e, now),
            })
    }

    /// Insert a value, evicting outdated and least recently used entries
    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let max_stale = self.config.max_stale;
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        inner
            .entries
            .retain(|_, e| now.duration_since(e.inserted_at) <= max_stale);

        if !inner.entries.contains_key(&key) {
            while inner.entries.len() >= self.config.capacity.max(1) {
                let lru = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_access)
                    .map(|(k, _)| k.clone());
                match lru {
                    Some(k) => {
                        inner.entries.remove(&k);
                    }
                    None => break,
                }
            }
        }

        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                last_access: tick,
                expired: false,
            },
        );
    }

    /// Drop the freshness of an entry, keeping it as a stale fallback
    pub fn expire(&self, key: &K) -> bool {
        match self.lock().entries.get_mut(key) {
            Some(entry) => {
                entry.expired = true;
                true
            }
            None => false,
        }
    }

    /// Remove an entry entirely
    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().entries.remove(key).map(|e| e.value)
    }

    /// Evict every entry older than the stale window, returning how many
    /// were dropped
    pub fn purge(&self) -> usize {
        let now = Instant::now();
        let max_stale = self.config.max_stale;
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, e| now.duration_since(e.inserted_at) <= max_stale);
        before - inner.entries.len()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of entries held, fresh or stale
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            fresh: inner
                .entries
                .values()
                .filter(|e| self.is_fresh(e, now))
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> TtlCache<&'static str, u32> {
        TtlCache::new(TtlCacheConfig {
            ttl: Duration::from_secs(60),
            max_stale: Duration::from_secs(180),
            capacity,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_within_ttl() {
        let cache = cache(4);
        cache.insert("a", 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get_fresh(&"a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_after_ttl_but_readable() {
        let cache = cache(4);
        cache.insert("a", 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(cache.get_fresh(&"a"), None);

        let cached = cache.get_any(&"a").unwrap();
        assert_eq!(cached.value, 1);
        assert!(!cached.fresh);
        assert_eq!(cached.age, Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_past_stale_window() {
        let cache = cache(4);
        cache.insert("a", 1);

        tokio::time::advance(Duration::from_secs(181)).await;
        assert!(cache.get_any(&"a").is_none());
        assert_eq!(cache.purge(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction() {
        let cache = cache(2);
        cache.insert("a", 1);
        cache.insert("b", 2);

        // Touch "a" so "b" becomes least recently used
        assert_eq!(cache.get_fresh(&"a"), Some(1));
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get_any(&"b").is_none());
        assert_eq!(cache.get_fresh(&"a"), Some(1));
        assert_eq!(cache.get_fresh(&"c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_keeps_stale_fallback() {
        let cache = cache(4);
        cache.insert("a", 1);

        assert!(cache.expire(&"a"));
        assert_eq!(cache.get_fresh(&"a"), None);
        assert_eq!(cache.get_any(&"a").map(|c| c.value), Some(1));
        assert!(!cache.expire(&"missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_where_prefers_youngest() {
        let cache = cache(4);
        cache.insert("x->dest", 1);
        tokio::time::advance(Duration::from_secs(10)).await;
        cache.insert("y->dest", 2);
        cache.insert("y->other", 3);

        let latest = cache.latest_where(|k| k.ends_with("->dest")).unwrap();
        assert_eq!(latest.value, 2);
        assert!(cache.latest_where(|k| k.ends_with("->nowhere")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsert_refreshes_entry() {
        let cache = cache(1);
        cache.insert("a", 1);
        tokio::time::advance(Duration::from_secs(90)).await;
        cache.insert("a", 2);

        assert_eq!(cache.get_fresh(&"a"), Some(2));
        assert_eq!(cache.stats(), CacheStats { entries: 1, fresh: 1 });
    }
}
