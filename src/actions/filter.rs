//! Document filters for analytics requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A predicate over one field of a JSON document.
///
/// Field names are dotted paths (`"user.country"`).
///
/// ```json
/// { "operator": "between", "field": "latency", "from": 10, "to": 200 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum Filter {
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    GreaterThan { field: String, value: f64 },
    LessThan { field: String, value: f64 },
    /// Inclusive on both ends.
    Between { field: String, from: f64, to: f64 },
    In { field: String, values: Vec<Value> },
    Exists { field: String },
    /// Matches every document.
    Any,
}

impl Filter {
    pub fn field(&self) -> Option<&str> {
        match self {
            Filter::Equals { field, .. }
            | Filter::NotEquals { field, .. }
            | Filter::GreaterThan { field, .. }
            | Filter::LessThan { field, .. }
            | Filter::Between { field, .. }
            | Filter::In { field, .. }
            | Filter::Exists { field } => Some(field),
            Filter::Any => None,
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Any => true,
            Filter::Exists { field } => lookup(doc, field).map_or(false, |v| !v.is_null()),
            Filter::Equals { field, value } => lookup(doc, field).map_or(false, |v| same(v, value)),
            Filter::NotEquals { field, value } => {
                lookup(doc, field).map_or(true, |v| !same(v, value))
            }
            Filter::GreaterThan { field, value } => number(doc, field).map_or(false, |n| n > *value),
            Filter::LessThan { field, value } => number(doc, field).map_or(false, |n| n < *value),
            Filter::Between { field, from, to } => {
                number(doc, field).map_or(false, |n| n >= *from && n <= *to)
            }
            Filter::In { field, values } => {
                lookup(doc, field).map_or(false, |v| values.iter().any(|c| same(v, c)))
            }
        }
    }
}

/// How a filter list is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterCombiner {
    #[default]
    And,
    Or,
}

impl FilterCombiner {
    /// An empty list matches everything.
    pub fn matches(&self, filters: &[Filter], doc: &Value) -> bool {
        if filters.is_empty() {
            return true;
        }
        match self {
            FilterCombiner::And => filters.iter().all(|f| f.matches(doc)),
            FilterCombiner::Or => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

/// Resolves a dotted path inside `doc`.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, segment| node.get(segment))
}

/// Finite numeric value at `path`; numeric strings count, `"NaN"` and `"inf"` do not.
pub fn number(doc: &Value, path: &str) -> Option<f64> {
    let n = match lookup(doc, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

// 1 and 1.0 compare equal
fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
