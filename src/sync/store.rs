//! Bounded in-memory response cache.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;
use tracing::debug;

use super::key::EndpointKey;

/// Default maximum number of cached responses.
pub const DEFAULT_CAPACITY: usize = 256;

/// A cached response. Shared and never mutated once stored.
pub type Payload = Arc<dyn Any + Send + Sync>;

struct CacheEntry {
  payload: Payload,
  inserted_at: Instant,
  ttl: Duration,
}

impl CacheEntry {
  fn is_valid(&self, now: Instant) -> bool {
    now.saturating_duration_since(self.inserted_at) < self.ttl
  }
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub struct CachedPayload {
  pub payload: Payload,
  /// False once the entry outlived its TTL
  pub valid: bool,
}

/// Hit/miss counters, snapshot via [`ResponseCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
  pub hits: u64,
  pub stale_hits: u64,
  pub misses: u64,
  pub evictions: u64,
}

struct Inner {
  entries: IndexMap<EndpointKey, CacheEntry>,
  stats: CacheStats,
}

/// Time-bounded key/value store for remote responses.
///
/// Expired entries stay readable (flagged invalid) so they can serve as a
/// fallback, until the capacity bound evicts the least recently used entry or
/// [`sweep`](Self::sweep) removes them. Entry order in the map is recency
/// order, oldest first.
pub struct ResponseCache {
  inner: Mutex<Inner>,
  capacity: usize,
}

impl ResponseCache {
  pub fn new(capacity: usize) -> Self {
    Self {
      inner: Mutex::new(Inner {
        entries: IndexMap::new(),
        stats: CacheStats::default(),
      }),
      capacity: capacity.max(1),
    }
  }

  fn inner(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Look up `key`, marking it most recently used.
  pub fn get(&self, key: &EndpointKey) -> Option<CachedPayload> {
    let now = Instant::now();
    let mut inner = self.inner();

    let Some(index) = inner.entries.get_index_of(key) else {
      inner.stats.misses += 1;
      return None;
    };
    let last = inner.entries.len() - 1;
    inner.entries.move_index(index, last);

    let (_, entry) = inner.entries.get_index(last)?;
    let cached = CachedPayload {
      payload: Arc::clone(&entry.payload),
      valid: entry.is_valid(now),
    };
    if cached.valid {
      inner.stats.hits += 1;
    } else {
      inner.stats.stale_hits += 1;
    }

    Some(cached)
  }

  /// Store `payload` under `key`, replacing whatever was there.
  pub fn put(&self, key: EndpointKey, payload: Payload, ttl: Duration) {
    let mut inner = self.inner();
    inner.entries.shift_remove(&key);
    inner.entries.insert(
      key,
      CacheEntry {
        payload,
        inserted_at: Instant::now(),
        ttl,
      },
    );

    while inner.entries.len() > self.capacity {
      if let Some((evicted, _)) = inner.entries.shift_remove_index(0) {
        debug!(key = %evicted, "Evicted least recently used cache entry");
        inner.stats.evictions += 1;
      }
    }
  }

  /// Drop the entry for `key`. Returns whether one existed.
  pub fn invalidate(&self, key: &EndpointKey) -> bool {
    self.inner().entries.shift_remove(key).is_some()
  }

  /// Remove every expired entry, returning how many were removed.
  pub fn sweep(&self) -> usize {
    let now = Instant::now();
    let mut inner = self.inner();
    let before = inner.entries.len();
    inner.entries.retain(|_, entry| entry.is_valid(now));
    let removed = before - inner.entries.len();
    if removed > 0 {
      debug!(removed, "Swept expired cache entries");
    }
    removed
  }

  pub fn len(&self) -> usize {
    self.inner().entries.len()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn stats(&self) -> CacheStats {
    self.inner().stats
  }
}

impl Default for ResponseCache {
  fn default() -> Self {
    Self::new(DEFAULT_CAPACITY)
  }
}
