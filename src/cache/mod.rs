//! 结果缓存模块：按动作名称隔离、可插拔后端的结果缓存。
//!
//! # Action Result Cache
//!
//! Every action type owns one named cache. Results are stored under a
//! [`CacheKey`] derived from the request fingerprint and a time bucket, so
//! identical requests submitted within the same window share one entry.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheBackend`] | Byte-level storage contract (local or distributed) |
//! | [`MemoryCache`] | In-process LRU backend with optional TTL |
//! | [`NullCache`] | No-op backend for disabling storage |
//! | [`Cache`] | Typed has/get/put handle over a named slot |
//! | [`CacheRegistry`] | Lazily created, exactly-once slot per action name |
//! | [`CacheFactory`] | Pluggable backend construction, swappable for tests |
//! | [`CacheKey`] / [`TimeWindow`] | Bucketed key derivation |
//!
//! ## Example
//!
//! ```rust
//! use query_action::cache::{Cache, CacheKey, CacheRegistry, MemoryCacheFactory};
//!
//! # async fn demo() -> query_action::Result<()> {
//! let registry = CacheRegistry::new(MemoryCacheFactory::new(1000));
//! let cache: Cache<Vec<u64>> = registry.cache_for("histogram");
//!
//! let key = CacheKey::from("histogram-clicks-56666667");
//! let stored = cache.put(&key, vec![1, 2, 3]).await?;
//! assert_eq!(cache.get(&key).await?, Some(stored));
//! # Ok(())
//! # }
//! ```

mod backend;
mod inflight;
mod key;
mod manager;
mod registry;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use inflight::{InFlightGuard, InFlightTable};
pub use key::{CacheKey, FingerprintBuilder, TimeWindow, DEFAULT_WINDOW_MS};
pub use manager::{Cache, CacheStats};
pub use registry::{
    global_cache_registry, CacheFactory, CacheRegistry, MemoryCacheFactory, NamedCache,
    NullCacheFactory,
};
