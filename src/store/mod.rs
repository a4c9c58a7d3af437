//! 统计存储抽象：为趋势统计动作提供按时间分桶的扩展统计。
//!
//! # Stats Store
//!
//! [`StatsStore`] is the query backend behind the stats trend action. It
//! answers one question: for the documents of a table matching some
//! filters, bucketed by a timestamp field, what are the extended stats and
//! percentiles of a numeric field in each bucket?
//!
//! [`InMemoryStatsStore`] answers it over JSON documents held in memory.

mod memory;

pub use memory::InMemoryStatsStore;

use crate::actions::{Filter, FilterCombiner};
use crate::BoxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A date histogram with stats and percentile sub-aggregations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramQuery {
    pub table: String,
    pub field: String,
    pub timestamp_field: String,
    pub filters: Vec<Filter>,
    pub combiner: FilterCombiner,
    /// Inclusive range, epoch ms.
    pub from: u64,
    pub to: u64,
    pub interval_ms: u64,
    pub percents: Vec<f64>,
}

/// Count, sum, min, max and moments of a bucket's values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtendedStats {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub sum_of_squares: f64,
    /// Population variance.
    pub variance: f64,
    pub std_deviation: f64,
}

impl ExtendedStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let count = values.len() as f64;
        let sum: f64 = values.iter().sum();
        let sum_of_squares: f64 = values.iter().map(|v| v * v).sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = sum / count;
        let variance = (sum_of_squares / count - avg * avg).max(0.0);
        Self {
            count: values.len() as u64,
            sum,
            min,
            max,
            avg,
            sum_of_squares,
            variance,
            std_deviation: variance.sqrt(),
        }
    }
}

/// One histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsBucket {
    /// Bucket start, epoch ms.
    pub key: i64,
    pub stats: ExtendedStats,
    /// `(percent, value)` in the order requested.
    pub percentiles: Vec<(f64, f64)>,
}

/// Query backend for the stats trend action.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Buckets are returned in ascending key order; empty buckets are omitted.
    async fn date_histogram_stats(
        &self,
        query: &HistogramQuery,
    ) -> std::result::Result<Vec<StatsBucket>, BoxError>;
}

/// Linearly interpolated percentile of an ascending slice.
pub fn percentile(sorted: &[f64], percent: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (percent.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}
