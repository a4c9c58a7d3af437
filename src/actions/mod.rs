//! 内置分析动作。
//!
//! # Built-in Actions
//!
//! | Opcode | Action | Request | Response |
//! |--------|--------|---------|----------|
//! | `statstrend` | [`StatsTrendAction`] | [`StatsTrendRequest`] | [`StatsTrendResponse`] |
//!
//! Requests select documents with [`Filter`]s joined by a [`FilterCombiner`].
//! [`register_builtin`] adds every built-in action to an
//! [`ActionRegistry`](crate::executor::ActionRegistry).

pub mod filter;
pub mod stats_trend;

pub use filter::{Filter, FilterCombiner};
pub use stats_trend::{
    Period, StatsTrendAction, StatsTrendRequest, StatsTrendResponse, StatsTrendValue,
};

use crate::executor::{ActionDescriptor, ActionRegistry};
use crate::store::StatsStore;
use crate::Result;
use std::sync::Arc;

/// Registers the built-in actions against `store`, with their default cachability.
pub fn register_builtin(
    registry: &ActionRegistry,
    store: Arc<dyn StatsStore>,
) -> Result<Vec<ActionDescriptor>> {
    let stats_trend = registry.register(stats_trend::OPCODE, move || {
        StatsTrendAction::new(Arc::clone(&store))
    })?;
    Ok(vec![stats_trend])
}
