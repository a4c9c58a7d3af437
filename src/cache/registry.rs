//! Named cache registry.

use super::backend::{CacheBackend, MemoryCache, NullCache};
use super::inflight::InFlightTable;
use super::manager::{AtomicStats, Cache};
use arc_swap::ArcSwap;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

/// Builds the backend for a logical action name.
pub trait CacheFactory: Send + Sync {
    fn create_cache_for(&self, name: &str) -> Arc<dyn CacheBackend>;
}

impl<F> CacheFactory for F
where
    F: Fn(&str) -> Arc<dyn CacheBackend> + Send + Sync,
{
    fn create_cache_for(&self, name: &str) -> Arc<dyn CacheBackend> {
        self(name)
    }
}

/// One [`MemoryCache`] per name.
#[derive(Debug, Clone)]
pub struct MemoryCacheFactory {
    max_entries: usize,
    ttl: Option<Duration>,
}

impl MemoryCacheFactory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            ttl: None,
        }
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl Default for MemoryCacheFactory {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl CacheFactory for MemoryCacheFactory {
    fn create_cache_for(&self, _name: &str) -> Arc<dyn CacheBackend> {
        let cache = MemoryCache::new(self.max_entries);
        match self.ttl {
            Some(ttl) => Arc::new(cache.with_ttl(ttl)),
            None => Arc::new(cache),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullCacheFactory;

impl CacheFactory for NullCacheFactory {
    fn create_cache_for(&self, _name: &str) -> Arc<dyn CacheBackend> {
        Arc::new(NullCache::new())
    }
}

/// Storage, statistics and in-flight locks shared by every handle of one name.
pub struct NamedCache {
    name: String,
    backend: Arc<dyn CacheBackend>,
    stats: AtomicStats,
    in_flight: InFlightTable,
}

impl NamedCache {
    fn new(name: &str, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            name: name.to_string(),
            backend,
            stats: AtomicStats::default(),
            in_flight: InFlightTable::new(),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }
    pub(crate) fn stats(&self) -> &AtomicStats {
        &self.stats
    }
    pub(crate) fn in_flight(&self) -> &InFlightTable {
        &self.in_flight
    }
}

/// Maps logical action names to their dedicated caches.
///
/// Slots are created lazily on first access, exactly once per name even under
/// concurrent first access, and live until [`CacheRegistry::reset`].
pub struct CacheRegistry {
    factory: ArcSwap<Box<dyn CacheFactory>>,
    slots: RwLock<HashMap<String, Arc<NamedCache>>>,
}

impl CacheRegistry {
    pub fn new(factory: impl CacheFactory + 'static) -> Self {
        let factory: Box<dyn CacheFactory> = Box::new(factory);
        Self {
            factory: ArcSwap::from_pointee(factory),
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn cache_for<V>(&self, name: &str) -> Cache<V>
    where
        V: Serialize + DeserializeOwned,
    {
        Cache::new(self.slot(name))
    }

    fn slot(&self, name: &str) -> Arc<NamedCache> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        let slot = slots.entry(name.to_string()).or_insert_with(|| {
            let backend = self.factory.load().create_cache_for(name);
            info!(cache = name, backend = backend.name(), "Created action cache");
            Arc::new(NamedCache::new(name, backend))
        });
        Arc::clone(slot)
    }

    /// Replaces the factory used for caches created from now on.
    pub fn set_factory(&self, factory: impl CacheFactory + 'static) {
        let factory: Box<dyn CacheFactory> = Box::new(factory);
        self.factory.store(Arc::new(factory));
    }

    /// Drops every slot; the next access recreates it through the current factory.
    pub fn reset(&self) {
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new(MemoryCacheFactory::default())
    }
}

static GLOBAL_CACHE_REGISTRY: once_cell::sync::Lazy<Arc<CacheRegistry>> =
    once_cell::sync::Lazy::new(|| Arc::new(CacheRegistry::default()));

/// Process-wide registry used when no explicit one is configured.
pub fn global_cache_registry() -> Arc<CacheRegistry> {
    Arc::clone(&GLOBAL_CACHE_REGISTRY)
}
