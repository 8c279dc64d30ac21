//! Bounded TTL cache shared by the payout and registry halves.
//!
//! Entries expire lazily: an entry older than its TTL is dropped the next
//! time it is read. When a write would exceed capacity, one entry is evicted
//! according to the configured [`EvictionPolicy`].
//!
//! The cache is purely a performance layer. Nothing that decides whether to
//! pay or whether content is a duplicate may trust a miss.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 1_000;

/// Which entry to drop when the cache is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Drop the entry written longest ago. Reads do not affect the order.
    #[default]
    OldestWritten,
    /// Drop the entry read or written longest ago.
    LeastRecentlyUsed,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    written_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.written_at) > self.ttl
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (including expired entries).
    pub misses: u64,
    /// Number of entries written.
    pub insertions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<V>>,
    stats: CacheStats,
}

/// Generic time-boxed key/value cache.
///
/// Cloning is cheap and clones share the same storage.
pub struct TtlCache<K: Hash + Eq, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
    default_ttl: Duration,
    policy: EvictionPolicy,
}

impl<K: Hash + Eq, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            default_ttl: self.default_ttl,
            policy: self.policy,
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache with the default capacity and oldest-written eviction.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY, default_ttl)
    }

    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize, default_ttl: Duration) -> Self {
        Self::with_policy(capacity, default_ttl, EvictionPolicy::default())
    }

    /// Create a cache with an explicit eviction policy.
    #[must_use]
    pub fn with_policy(capacity: usize, default_ttl: Duration, policy: EvictionPolicy) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: LruCache::new(cap),
                stats: CacheStats::default(),
            })),
            default_ttl,
            policy,
        }
    }

    /// Look up a live entry. Expired entries are removed and count as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match inner.entries.peek(key).map(|entry| entry.is_expired(now)) {
            None => {
                inner.stats.misses += 1;
                return None;
            }
            Some(true) => {
                inner.entries.pop(key);
                inner.stats.expirations += 1;
                inner.stats.misses += 1;
                return None;
            }
            Some(false) => {}
        }

        let value = match self.policy {
            EvictionPolicy::OldestWritten => inner.entries.peek(key).map(|e| e.data.clone()),
            EvictionPolicy::LeastRecentlyUsed => inner.entries.get(key).map(|e| e.data.clone()),
        };
        inner.stats.hits += 1;
        value
    }

    /// Check whether a live entry exists.
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Write an entry with the cache's default TTL, overwriting in place.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Write an entry with an explicit TTL.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            data: value,
            written_at: Instant::now(),
            ttl,
        };
        let mut inner = self.inner.lock();
        if let Some((displaced, _)) = inner.entries.push(key.clone(), entry) {
            if displaced != key {
                inner.stats.evictions += 1;
            }
        }
        inner.stats.insertions += 1;
    }

    /// Remove a single entry.
    pub fn invalidate(&self, key: &K) {
        self.inner.lock().entries.pop(key);
    }

    /// Remove all entries. Statistics are kept.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Drop every expired entry now instead of waiting for a read.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let stale: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            inner.entries.pop(key);
        }
        inner.stats.expirations += stale.len() as u64;
        stale.len()
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Number of stored entries, including ones not yet lazily expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// The TTL applied by [`TtlCache::insert`].
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}
