//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use query_action::action::{ExecutionContext, ManualClock};
use query_action::cache::{CacheRegistry, MemoryCacheFactory};
use query_action::store::{HistogramQuery, InMemoryStatsStore, StatsBucket, StatsStore};
use query_action::BoxError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const HOUR: u64 = 3_600_000;
/// Hour-aligned epoch ms, 30s-aligned as well.
pub const T: u64 = 1_700_002_800_000;

/// Documents for `clicks` across the two hours following `T`.
pub fn seeded_store() -> Arc<InMemoryStatsStore> {
    let store = Arc::new(InMemoryStatsStore::new());
    store.extend(
        "clicks",
        (0..6u64).map(|i| {
            json!({
                "_timestamp": T + i * 20 * 60_000,
                "latency": 10 * (i + 1),
                "status": if i % 2 == 0 { "ok" } else { "error" },
            })
        }),
    );
    store
}

pub fn context(clock: Arc<ManualClock>) -> ExecutionContext {
    let registry = Arc::new(CacheRegistry::new(MemoryCacheFactory::new(1_000)));
    ExecutionContext::new(registry).with_clock(clock)
}

/// Delays every query so concurrent callers overlap.
pub struct SlowStore {
    pub inner: Arc<InMemoryStatsStore>,
    pub delay: Duration,
}

#[async_trait]
impl StatsStore for SlowStore {
    async fn date_histogram_stats(
        &self,
        query: &HistogramQuery,
    ) -> Result<Vec<StatsBucket>, BoxError> {
        tokio::time::sleep(self.delay).await;
        self.inner.date_histogram_stats(query).await
    }
}
