use super::{percentile, ExtendedStats, HistogramQuery, StatsBucket, StatsStore};
use crate::actions::filter;
use crate::BoxError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// JSON documents grouped by table.
///
/// Documents without a numeric timestamp are never matched; documents whose
/// stats field is missing or non-numeric are skipped.
#[derive(Debug, Default)]
pub struct InMemoryStatsStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    failure: RwLock<Option<String>>,
    calls: AtomicU64,
}

impl InMemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, table: impl Into<String>, doc: Value) {
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(table.into())
            .or_default()
            .push(doc);
    }

    pub fn extend(&self, table: impl Into<String>, docs: impl IntoIterator<Item = Value>) {
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(table.into())
            .or_default()
            .extend(docs);
    }

    /// Every query fails with `message` until [`InMemoryStatsStore::recover`].
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of queries received, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(table)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl StatsStore for InMemoryStatsStore {
    async fn date_histogram_stats(
        &self,
        query: &HistogramQuery,
    ) -> Result<Vec<StatsBucket>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.read().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(message.into());
        }

        let interval = query.interval_ms.max(1) as i64;
        let mut grouped: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        {
            let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
            let docs = tables.get(&query.table).map(Vec::as_slice).unwrap_or(&[]);
            for doc in docs {
                let Some(ts) = filter::number(doc, &query.timestamp_field) else {
                    continue;
                };
                if ts < query.from as f64 || ts > query.to as f64 {
                    continue;
                }
                if !query.combiner.matches(&query.filters, doc) {
                    continue;
                }
                let Some(value) = filter::number(doc, &query.field) else {
                    continue;
                };
                let ts = ts as i64;
                grouped
                    .entry(ts - ts.rem_euclid(interval))
                    .or_default()
                    .push(value);
            }
        }

        let buckets: Vec<StatsBucket> = grouped
            .into_iter()
            .map(|(key, mut values)| {
                values.sort_by(|a, b| a.total_cmp(b));
                StatsBucket {
                    key,
                    stats: ExtendedStats::from_values(&values),
                    percentiles: query
                        .percents
                        .iter()
                        .map(|p| (*p, percentile(&values, *p)))
                        .collect(),
                }
            })
            .collect();
        debug!(table = %query.table, field = %query.field, buckets = buckets.len(), "Histogram computed");
        Ok(buckets)
    }
}
