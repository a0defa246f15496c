//! The get/set/invalidate contract the entity services cache through.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::keys::CacheKey;

/// Key-value cache with per-entry TTL.
///
/// Implementations may be process-local or external. The cache is always
/// disposable: an adapter that forgets everything is still correct, so
/// failures are logged inside the adapter rather than returned.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// Live value for `key`; entries past their TTL are absent.
    async fn get(&self, key: &CacheKey) -> Option<Value>;

    async fn set(&self, key: CacheKey, value: Value, ttl: Duration);

    /// Token for a read-through fill of `key`. Take it before reading storage.
    async fn fill_token(&self, key: &CacheKey) -> FillToken;

    /// Store `value` unless `key` was invalidated after `token` was taken.
    ///
    /// A read that raced a write must not put the pre-write value back.
    async fn fill(&self, key: CacheKey, value: Value, ttl: Duration, token: FillToken);

    async fn invalidate(&self, key: &CacheKey);
}

/// Invalidation generation observed when a fill started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FillToken(u64);

impl FillToken {
    pub fn new(generation: u64) -> Self {
        Self(generation)
    }

    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Adapter that never stores anything; every read is a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheAdapter for NoopCache {
    async fn get(&self, _key: &CacheKey) -> Option<Value> {
        None
    }

    async fn set(&self, _key: CacheKey, _value: Value, _ttl: Duration) {}

    async fn fill_token(&self, _key: &CacheKey) -> FillToken {
        FillToken::default()
    }

    async fn fill(&self, _key: CacheKey, _value: Value, _ttl: Duration, _token: FillToken) {}

    async fn invalidate(&self, _key: &CacheKey) {}
}
