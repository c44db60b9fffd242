//! Tag-indexed response cache.
//!
//! # Responsibilities
//! - Store upstream responses under a [`CacheKey`] with a TTL and a tag set
//! - Remove every entry carrying a tag on invalidation
//! - Enforce a capacity bound with LRU eviction
//!
//! # Design Decisions
//! - One mutex guards the LRU map and the tag index, so `get`/`put`/
//!   `invalidate` are atomic with respect to each other
//! - The lock is never held across an `.await`
//! - Entries are immutable once stored and handed out as `Arc` clones
//! - Expired entries are never returned; they are evicted lazily on `get`
//!   and by the background sweeper
//! - Capacity eviction only drops entries early, it never extends a TTL

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use lru::LruCache;
use serde::Serialize;
use tokio::time::Instant;

use crate::cache::key::{CacheKey, Tag};
use crate::observability::metrics;

/// A stored upstream response.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub body: Bytes,
    pub headers: HeaderMap,
    pub status: StatusCode,
    pub tags: HashSet<Tag>,
    pub stored_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time the entry has spent in the cache.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub tags: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub invalidated: u64,
    pub expired: u64,
    pub evicted: u64,
}

#[derive(Default)]
struct TagIndex(HashMap<Tag, HashSet<CacheKey>>);

impl TagIndex {
    fn link(&mut self, entry: &CacheEntry) {
        for tag in &entry.tags {
            self.0.entry(tag.clone()).or_default().insert(entry.key.clone());
        }
    }

    fn unlink(&mut self, entry: &CacheEntry) {
        for tag in &entry.tags {
            if let Some(keys) = self.0.get_mut(tag) {
                keys.remove(&entry.key);
                if keys.is_empty() {
                    self.0.remove(tag);
                }
            }
        }
    }
}

struct CacheState {
    entries: LruCache<CacheKey, Arc<CacheEntry>>,
    index: TagIndex,
    stats: CacheStats,
}

impl CacheState {
    /// Remove an entry and unlink it from the tag index.
    fn remove(&mut self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let entry = self.entries.pop(key)?;
        self.index.unlink(&entry);
        Some(entry)
    }
}

/// Thread-safe response cache shared by every handler.
pub struct TaggedCache {
    state: Mutex<CacheState>,
    max_entry_bytes: usize,
}

impl TaggedCache {
    /// Create an empty cache.
    pub fn new(capacity: usize, max_entry_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                index: TagIndex::default(),
                stats: CacheStats::default(),
            }),
            max_entry_bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a live entry. Expired entries count as a miss and are evicted.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let expired = match state.entries.peek(key) {
            None => {
                state.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            state.remove(key);
            state.stats.misses += 1;
            state.stats.expired += 1;
            metrics::record_cache_eviction("expired", 1);
            metrics::record_cache_size(state.entries.len());
            return None;
        }

        state.stats.hits += 1;
        state.entries.get(key).cloned()
    }

    /// Store a response, replacing any entry under the same key.
    ///
    /// Returns `false` when the body exceeds the per-entry size limit; the
    /// previous entry (if any) is left untouched in that case.
    pub fn put(
        &self,
        key: CacheKey,
        body: Bytes,
        headers: HeaderMap,
        status: StatusCode,
        tags: HashSet<Tag>,
        ttl: Duration,
    ) -> bool {
        if body.len() > self.max_entry_bytes {
            tracing::debug!(cache_key = %key, size = body.len(), "Response too large to cache");
            return false;
        }

        let now = Instant::now();
        let entry = Arc::new(CacheEntry {
            key: key.clone(),
            body,
            headers,
            status,
            tags,
            stored_at: now,
            expires_at: now + ttl,
        });

        let mut state = self.lock();
        state.remove(&key);
        state.index.link(&entry);
        state.stats.stores += 1;

        // The key was just removed, so anything handed back is the LRU victim
        if let Some((_, evicted)) = state.entries.push(key, entry) {
            state.index.unlink(&evicted);
            state.stats.evicted += 1;
            metrics::record_cache_eviction("capacity", 1);
        }
        metrics::record_cache_size(state.entries.len());
        true
    }

    /// Remove every entry whose tag set contains `tag`. Returns the count.
    pub fn invalidate(&self, tag: &Tag) -> usize {
        let mut state = self.lock();
        let Some(keys) = state.index.0.remove(tag) else {
            return 0;
        };

        let mut removed = 0;
        for key in &keys {
            if state.remove(key).is_some() {
                removed += 1;
            }
        }
        state.stats.invalidated += removed as u64;
        metrics::record_cache_size(state.entries.len());
        removed
    }

    /// Drop all expired entries. Returns the count.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();

        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }

        if !expired.is_empty() {
            state.stats.expired += expired.len() as u64;
            metrics::record_cache_eviction("expired", expired.len() as u64);
            metrics::record_cache_size(state.entries.len());
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            tags: state.index.0.len(),
            capacity: state.entries.cap().get(),
            ..state.stats.clone()
        }
    }
}
