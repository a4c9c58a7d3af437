//! Per-period extended statistics of a numeric field.

use super::filter::{Filter, FilterCombiner};
use crate::action::{Action, Clock, Fingerprint, SystemClock};
use crate::cache::FingerprintBuilder;
use crate::store::{HistogramQuery, StatsBucket, StatsStore};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

pub const OPCODE: &str = "statstrend";

/// Range used when a request leaves `from` or `to` unset.
pub const DEFAULT_LOOKBACK_MS: u64 = 86_400_000;

pub const PERCENTS: [f64; 7] = [1.0, 5.0, 25.0, 50.0, 75.0, 95.0, 99.0];

// Range endpoints are coarsened to this granularity in the fingerprint.
const RANGE_GRANULARITY_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Seconds,
    Minutes,
    #[default]
    Hours,
    Days,
}

impl Period {
    pub fn interval_millis(&self) -> u64 {
        match self {
            Period::Seconds => 1_000,
            Period::Minutes => 60_000,
            Period::Hours => 3_600_000,
            Period::Days => 86_400_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Seconds => "seconds",
            Period::Minutes => "minutes",
            Period::Hours => "hours",
            Period::Days => "days",
        }
    }
}

fn default_timestamp() -> String {
    "_timestamp".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTrendRequest {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    /// `None` means every document of the table.
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
    #[serde(default)]
    pub combiner: FilterCombiner,
    /// Epoch ms; `0` together with `to == 0` (or either alone) selects the last day.
    #[serde(default)]
    pub from: u64,
    #[serde(default)]
    pub to: u64,
    #[serde(default)]
    pub period: Period,
    #[serde(default = "default_timestamp")]
    pub timestamp: String,
}

impl StatsTrendRequest {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            field: Some(field.into()),
            filters: None,
            combiner: FilterCombiner::And,
            from: 0,
            to: 0,
            period: Period::Hours,
            timestamp: default_timestamp(),
        }
    }

    pub fn between(mut self, from: u64, to: u64) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.get_or_insert_with(Vec::new).push(filter);
        self
    }

    pub fn with_combiner(mut self, combiner: FilterCombiner) -> Self {
        self.combiner = combiner;
        self
    }
}

impl Fingerprint for StatsTrendRequest {
    fn fingerprint(&self) -> String {
        let digest = FingerprintBuilder::new("")
            .part("filters", format!("{:?}", self.filters))
            .part("combiner", format!("{:?}", self.combiner))
            .part("period", self.period.as_str())
            .part("timestamp", &self.timestamp)
            .part("field", self.field.as_deref().unwrap_or("FIELD"))
            .digest();
        format!(
            "stats-trend-{}-{}-{}-{}-{}",
            self.table.as_deref().unwrap_or("null"),
            self.field.as_deref().unwrap_or("null"),
            self.from / RANGE_GRANULARITY_MS,
            self.to / RANGE_GRANULARITY_MS,
            digest
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTrendValue {
    /// Bucket start, epoch ms.
    pub period: i64,
    pub stats: BTreeMap<String, f64>,
    /// Keyed by percent, e.g. `"99.0"`.
    pub percentiles: BTreeMap<String, f64>,
}

impl From<StatsBucket> for StatsTrendValue {
    fn from(bucket: StatsBucket) -> Self {
        let s = bucket.stats;
        let stats = [
            ("avg", s.avg),
            ("sum", s.sum),
            ("count", s.count as f64),
            ("min", s.min),
            ("max", s.max),
            ("sum_of_squares", s.sum_of_squares),
            ("variance", s.variance),
            ("std_deviation", s.std_deviation),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let percentiles = bucket
            .percentiles
            .into_iter()
            .map(|(p, v)| (format!("{:.1}", p), v))
            .collect();
        Self {
            period: bucket.key,
            stats,
            percentiles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTrendResponse {
    pub result: Vec<StatsTrendValue>,
}

/// Trend of a field's extended stats over time buckets.
///
/// Not cachable unless enabled with [`StatsTrendAction::cachable`].
pub struct StatsTrendAction {
    store: Arc<dyn StatsStore>,
    clock: Arc<dyn Clock>,
    cachable: bool,
}

impl StatsTrendAction {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            cachable: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cachable(mut self, cachable: bool) -> Self {
        self.cachable = cachable;
        self
    }

    /// Fills defaults and rejects requests that cannot be run.
    pub fn normalize(&self, mut request: StatsTrendRequest) -> Result<HistogramQuery> {
        let table = request.table.as_deref().and_then(valid_table_name).ok_or_else(|| {
            Error::invalid_request_with_context(
                "Invalid Table",
                ErrorContext::new().with_field_path("table"),
            )
        })?;
        let filters = request.filters.take().unwrap_or_else(|| vec![Filter::Any]);

        let (from, to) = if request.from == 0 || request.to == 0 {
            let now = self.clock.now_millis();
            (now.saturating_sub(DEFAULT_LOOKBACK_MS), now)
        } else {
            (request.from, request.to)
        };

        let field = match request.field {
            Some(field) if !field.is_empty() => field,
            _ => {
                return Err(Error::invalid_request_with_context(
                    "Invalid field name",
                    ErrorContext::new().with_field_path("field"),
                ))
            }
        };

        Ok(HistogramQuery {
            table,
            field,
            timestamp_field: request.timestamp,
            filters,
            combiner: request.combiner,
            from,
            to,
            interval_ms: request.period.interval_millis(),
            percents: PERCENTS.to_vec(),
        })
    }
}

/// Trimmed, lower-cased table name; `None` if nothing is left.
pub fn valid_table_name(table: &str) -> Option<String> {
    let table = table.trim();
    (!table.is_empty()).then(|| table.to_lowercase())
}

#[async_trait]
impl Action for StatsTrendAction {
    type Parameter = StatsTrendRequest;
    type Response = StatsTrendResponse;

    fn name(&self) -> &str {
        OPCODE
    }

    fn is_cachable(&self) -> bool {
        self.cachable
    }

    async fn compute(&self, parameter: StatsTrendRequest) -> Result<StatsTrendResponse> {
        let query = self.normalize(parameter)?;
        debug!(table = %query.table, field = %query.field, from = query.from, to = query.to, "Running stats trend");
        let buckets = self.store.date_histogram_stats(&query).await.map_err(|e| {
            error!(table = %query.table, error = %e, "Error running stats query");
            Error::query_execution("Error running stats query.", e)
        })?;
        Ok(StatsTrendResponse {
            result: buckets.into_iter().map(StatsTrendValue::from).collect(),
        })
    }
}
