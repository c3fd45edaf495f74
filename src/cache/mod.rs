mod fingerprint;

pub use fingerprint::Fingerprint;

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    response: String,
    created_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    entries: LruCache<Fingerprint, CacheEntry>,
    stats: CacheStats,
}

/// Bounded LRU store of completed answers with lazy TTL expiry.
///
/// Every operation takes the lock for its whole duration, so a caller that
/// is cancelled between operations can never observe or leave behind a
/// half-applied update. Recency follows access order: a successful `get`
/// promotes the entry just like a `put` does.
pub struct ResponseCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner { entries: LruCache::new(cap), stats: CacheStats::default() }),
            ttl,
        }
    }

    pub fn get(&self, key: &Fingerprint) -> Option<String> {
        let mut inner = self.inner.lock();
        let state = inner.entries.peek(key).map(|e| e.created_at.elapsed() > self.ttl);
        let Some(expired) = state else {
            inner.stats.misses += 1;
            return None;
        };
        if expired {
            inner.entries.pop(key);
            inner.stats.expired += 1;
            inner.stats.misses += 1;
            debug!(key = %key.short(), "cache entry expired");
            return None;
        }
        let response = inner.entries.get(key).map(|e| e.response.clone());
        inner.stats.hits += 1;
        response
    }

    /// Reports whether a live entry exists without promoting it or counting
    /// a hit. Expired entries found here are dropped.
    pub fn contains(&self, key: &Fingerprint) -> bool {
        let mut inner = self.inner.lock();
        let state = inner.entries.peek(key).map(|e| e.created_at.elapsed() > self.ttl);
        match state {
            Some(false) => true,
            Some(true) => {
                inner.entries.pop(key);
                inner.stats.expired += 1;
                false
            }
            None => false,
        }
    }

    pub fn put(&self, key: Fingerprint, response: impl Into<String>) {
        let entry = CacheEntry { response: response.into(), created_at: Instant::now() };
        let mut inner = self.inner.lock();
        if let Some((evicted, _)) = inner.entries.push(key, entry) {
            if evicted != key {
                inner.stats.evictions += 1;
                debug!(key = %evicted.short(), "evicted least recently used entry");
            }
        }
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().entries.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Keys from most to least recently used.
    pub fn recency(&self) -> Vec<Fingerprint> {
        self.inner.lock().entries.iter().map(|(k, _)| *k).collect()
    }
}
