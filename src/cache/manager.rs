//! Typed cache handle.

use super::inflight::InFlightGuard;
use super::key::CacheKey;
use super::registry::NamedCache;
use crate::{Error, ErrorContext, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
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

#[derive(Default)]
pub(crate) struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    pub(crate) fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Typed view over a named cache slot.
///
/// Values are stored as JSON so any backend, local or distributed, can hold
/// them. Handles are cheap to clone and all handles for one logical name
/// share storage, statistics and in-flight locks.
pub struct Cache<V> {
    slot: Arc<NamedCache>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            _marker: PhantomData,
        }
    }
}

impl<V> Cache<V>
where
    V: Serialize + DeserializeOwned,
{
    pub(crate) fn new(slot: Arc<NamedCache>) -> Self {
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.slot.name()
    }

    pub fn backend_name(&self) -> &'static str {
        self.slot.backend().name()
    }

    pub async fn has(&self, key: &CacheKey) -> Result<bool> {
        self.slot
            .backend()
            .exists(key.as_str())
            .await
            .map_err(|e| self.unavailable("exists", key, e))
    }

    /// Reads and decodes a value. Undecodable entries read as a miss.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<V>> {
        let stats = self.slot.stats();
        let bytes = match self.slot.backend().get(key.as_str()).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.unavailable("get", key, e)),
        };
        match bytes {
            Some(data) => match serde_json::from_slice(&data) {
                Ok(value) => {
                    stats.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(value))
                }
                Err(e) => {
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(cache = self.name(), key = %key, error = %e, "Discarding undecodable cache entry");
                    Ok(None)
                }
            },
            None => {
                stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Stores `value` under `key` and hands it back.
    ///
    /// Values whose encoding does not decode back as `V` (non-finite floats
    /// become JSON `null`) are rejected with [`Error::Serialization`] and
    /// nothing is written.
    pub async fn put(&self, key: &CacheKey, value: V) -> Result<V> {
        let data = serde_json::to_vec(&value)?;
        if let Err(e) = serde_json::from_slice::<V>(&data) {
            self.slot.stats().errors.fetch_add(1, Ordering::Relaxed);
            warn!(cache = self.name(), key = %key, error = %e, "Refusing to store unreadable value");
            return Err(Error::Serialization(e));
        }
        self.slot
            .backend()
            .set(key.as_str(), &data)
            .await
            .map_err(|e| self.unavailable("set", key, e))?;
        self.slot.stats().sets.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    pub async fn len(&self) -> Result<usize> {
        self.slot.backend().len().await
    }

    pub fn stats(&self) -> CacheStats {
        self.slot.stats().to_stats()
    }

    pub(crate) async fn lock_key(&self, key: &CacheKey) -> InFlightGuard<'_> {
        self.slot.in_flight().acquire(key.as_str()).await
    }

    pub(crate) fn is_key_contended(&self, key: &CacheKey) -> bool {
        self.slot.in_flight().is_contended(key.as_str())
    }

    fn unavailable(&self, op: &str, key: &CacheKey, e: Error) -> Error {
        self.slot.stats().errors.fetch_add(1, Ordering::Relaxed);
        match e {
            Error::CacheUnavailable { .. } => e,
            other => Error::cache_unavailable_with_context(
                format!("cache '{}' failed on {}", self.name(), op),
                ErrorContext::new()
                    .with_details(format!("key {}: {}", key, other))
                    .with_source(self.backend_name()),
            ),
        }
    }
}
