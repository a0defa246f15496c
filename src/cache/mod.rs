//! Entity cache.
//!
//! Services read through a [`CacheAdapter`] keyed by `entity:id` and
//! invalidate the key after every successful write. The cache is a derived
//! view of storage; an empty cache is always correct.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1000
//! default_ttl_seconds = 300
//! ```

mod adapter;
mod config;
mod keys;
mod lock;
mod memory;

pub use adapter::{CacheAdapter, FillToken, NoopCache};
pub use config::CacheConfig;
pub use keys::CacheKey;
pub use memory::MemoryCache;

pub(crate) use memory::{
    METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATE, METRIC_CACHE_MISS,
};
