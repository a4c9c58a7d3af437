//! # query-action-rs
//!
//! 参数化分析查询的缓存执行框架：同步缓存穿透执行与异步“提交后轮询”。
//!
//! Cached execution of parameterized analytics queries, with a blocking
//! cache-through mode and an asynchronous fire-and-poll mode.
//!
//! ## Overview
//!
//! Each query category is an [`Action`]. Invoking an action with a request
//! derives a cache key from the request's fingerprint and the current time
//! bucket (`<fingerprint>-<floor(now_ms / 30000)>` by default), so identical
//! requests within one window share one result. Results live in a per-action
//! named cache whose backend is pluggable.
//!
//! ## Core Philosophy
//!
//! - **Actions compute, the framework caches**: keying, single-flight and
//!   scheduling are shared; actions only implement `compute`
//! - **Pluggable storage**: [`cache::CacheFactory`] decides the backend per action name
//! - **Fire and poll**: async submission returns the cache key immediately
//! - **Typed at the edges**: requests and responses are serde types; the
//!   dispatcher speaks JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use query_action::actions::{self, StatsTrendRequest};
//! use query_action::config::ExecutorConfig;
//! use query_action::executor::{ActionRegistry, QueryExecutor};
//! use query_action::store::InMemoryStatsStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> query_action::Result<()> {
//!     query_action::telemetry::init_tracing();
//!
//!     let registry = Arc::new(ActionRegistry::new());
//!     actions::register_builtin(&registry, Arc::new(InMemoryStatsStore::new()))?;
//!     let executor = QueryExecutor::from_config(registry, &ExecutorConfig::from_env()?)?;
//!
//!     let request = StatsTrendRequest::new("clicks", "latency");
//!     let response = executor
//!         .execute("statstrend", serde_json::to_value(request)?)
//!         .await?;
//!     println!("{}", response);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`action`] | Action contract, cache key derivation, sync/async invocation |
//! | [`cache`] | Named caches, backends, registry and factories |
//! | [`executor`] | Opcode registry and the query dispatcher |
//! | [`scheduler`] | Background task execution for async invocations |
//! | [`actions`] | Built-in analytics actions and request filters |
//! | [`store`] | Query backends for the built-in actions |
//! | [`config`] | YAML / environment configuration |
//! | [`telemetry`] | Logging setup |

pub mod action;
pub mod actions;
pub mod cache;
pub mod config;
pub mod executor;
pub mod scheduler;
pub mod store;
pub mod telemetry;

// Re-export main types for convenience
pub use action::{Action, ExecutionContext, Fingerprint, Invocation};
pub use cache::{Cache, CacheKey, CacheRegistry};
pub use config::ExecutorConfig;
pub use executor::{ActionRegistry, QueryExecutor};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{BoxError, Error, ErrorCode, ErrorContext};
