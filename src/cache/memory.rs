//! Process-local cache adapter backed by an LRU map with per-entry expiry.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{trace, warn};

use super::adapter::{CacheAdapter, FillToken};
use super::keys::CacheKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::memory";

pub(crate) const METRIC_CACHE_HIT: &str = "agora_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "agora_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "agora_cache_evict_total";
pub(crate) const METRIC_CACHE_INVALIDATE: &str = "agora_cache_invalidate_total";

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory [`CacheAdapter`].
///
/// Expiry is checked against tokio's clock so tests can pause and advance
/// time. Expired entries are dropped when looked up; capacity overflow evicts
/// the least recently used entry.
///
/// Every invalidation bumps a generation counter and leaves a tombstone for
/// the key. A [`fill`](CacheAdapter::fill) whose token predates the key's
/// tombstone is dropped. Tombstones are bounded by the same capacity; once one
/// is pushed out, fills older than it are dropped for every key.
pub struct MemoryCache {
    state: Mutex<State>,
}

struct State {
    entries: LruCache<CacheKey, CacheEntry>,
    tombstones: LruCache<CacheKey, u64>,
    generation: u64,
    /// Newest generation among tombstones evicted from `tombstones`.
    forgotten: u64,
}

impl State {
    fn invalidated_since(&self, key: &CacheKey, token: FillToken) -> bool {
        let since = token.generation();
        self.forgotten > since || self.tombstones.peek(key).is_some_and(|&g| g > since)
    }
}

impl MemoryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(State {
                entries: LruCache::new(capacity),
                tombstones: LruCache::new(capacity),
                generation: 0,
                forgotten: 0,
            }),
        }
    }

    /// Number of stored entries, expired ones included until they are looked up.
    pub fn len(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.state, SOURCE, "clear").entries.clear();
    }

    fn store(&self, key: CacheKey, value: Value, ttl: Duration, token: Option<FillToken>) {
        if ttl.is_zero() {
            return;
        }
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            warn!(key = %key, ttl_secs = ttl.as_secs(), "cache ttl out of range; entry not stored");
            return;
        };

        let mut state = mutex_lock(&self.state, SOURCE, "set");
        if let Some(token) = token
            && state.invalidated_since(&key, token)
        {
            trace!(key = %key, "fill raced an invalidation; entry not stored");
            return;
        }
        let evicted = state
            .entries
            .push(key.clone(), CacheEntry { value, expires_at });
        drop(state);

        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!(METRIC_CACHE_EVICT, "entity" => evicted_key.entity().to_string()).increment(1);
        }
    }
}

#[async_trait]
impl CacheAdapter for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        let mut state = mutex_lock(&self.state, SOURCE, "get");

        let live = match state.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                state.entries.pop(key);
                trace!(key = %key, "expired cache entry dropped");
                None
            }
            None => None,
        };
        drop(state);

        let entity = key.entity().to_string();
        if live.is_some() {
            counter!(METRIC_CACHE_HIT, "entity" => entity).increment(1);
        } else {
            counter!(METRIC_CACHE_MISS, "entity" => entity).increment(1);
        }
        live
    }

    async fn set(&self, key: CacheKey, value: Value, ttl: Duration) {
        self.store(key, value, ttl, None);
    }

    async fn fill_token(&self, _key: &CacheKey) -> FillToken {
        FillToken::new(mutex_lock(&self.state, SOURCE, "fill_token").generation)
    }

    async fn fill(&self, key: CacheKey, value: Value, ttl: Duration, token: FillToken) {
        self.store(key, value, ttl, Some(token));
    }

    async fn invalidate(&self, key: &CacheKey) {
        {
            let mut state = mutex_lock(&self.state, SOURCE, "invalidate");
            state.entries.pop(key);
            state.generation += 1;
            let generation = state.generation;
            if let Some((old_key, old_generation)) = state.tombstones.push(key.clone(), generation)
                && old_key != *key
            {
                state.forgotten = state.forgotten.max(old_generation);
            }
        }
        counter!(METRIC_CACHE_INVALIDATE, "entity" => key.entity().to_string()).increment(1);
    }
}
