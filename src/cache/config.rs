//! Cache configuration and adapter selection.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::adapter::{CacheAdapter, NoopCache};
use super::memory::MemoryCache;

const DEFAULT_CAPACITY: usize = 1_000;
const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every read goes to storage.
    pub enabled: bool,
    /// Maximum number of entities held by the in-memory cache.
    pub capacity: NonZeroUsize,
    /// TTL for services that do not declare their own.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity,
            default_ttl: settings.default_ttl,
        }
    }
}

impl CacheConfig {
    /// Build the adapter the services share.
    pub fn build_adapter(&self) -> Arc<dyn CacheAdapter> {
        if self.enabled {
            info!(
                capacity = self.capacity.get(),
                default_ttl_secs = self.default_ttl.as_secs(),
                "entity cache enabled"
            );
            Arc::new(MemoryCache::new(self.capacity))
        } else {
            info!("entity cache disabled");
            Arc::new(NoopCache)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::CacheKey;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.capacity.get(), 1_000);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn disabled_config_builds_cold_adapter() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = config.build_adapter();
        let key = CacheKey::new("tema", "t1");
        cache.set(key.clone(), json!(1), Duration::from_secs(60)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn enabled_config_builds_memory_adapter() {
        let cache = CacheConfig::default().build_adapter();
        let key = CacheKey::new("tema", "t1");
        cache.set(key.clone(), json!(1), Duration::from_secs(60)).await;
        assert_eq!(cache.get(&key).await, Some(json!(1)));
    }
}
