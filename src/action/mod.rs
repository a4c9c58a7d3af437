//! 动作执行框架：缓存键推导、同步缓存穿透执行与异步提交。
//!
//! # Action Execution
//!
//! An [`Action`] is one category of analytics query: it knows how to compute
//! a response for a parameter and whether that response may be cached. An
//! [`Invocation`] binds an action to one parameter and drives it:
//!
//! - [`Invocation::cache_key`] derives `<fingerprint>-<floor(now / window)>`
//!   once and memoizes it for the invocation's lifetime.
//! - [`Invocation::execute`] computes inline, through the cache when the
//!   action is cachable. Concurrent misses on one key run the backend once.
//! - [`Invocation::submit`] schedules the computation and returns the key
//!   immediately; poll with [`Invocation::lookup`].
//!
//! ## Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use query_action::action::{Action, ExecutionContext, Fingerprint, Invocation};
//! use query_action::cache::{CacheRegistry, MemoryCacheFactory};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct CountRequest { table: String }
//!
//! impl Fingerprint for CountRequest {
//!     fn fingerprint(&self) -> String { format!("count-{}", self.table) }
//! }
//!
//! struct CountAction;
//!
//! #[async_trait]
//! impl Action for CountAction {
//!     type Parameter = CountRequest;
//!     type Response = u64;
//!     fn name(&self) -> &str { "count" }
//!     fn is_cachable(&self) -> bool { true }
//!     async fn compute(&self, _request: CountRequest) -> query_action::Result<u64> { Ok(42) }
//! }
//!
//! # async fn demo() -> query_action::Result<()> {
//! let ctx = ExecutionContext::new(Arc::new(CacheRegistry::new(MemoryCacheFactory::new(100))));
//! let request = CountRequest { table: "clicks".into() };
//! let invocation = Invocation::with_parameter(Arc::new(CountAction), &ctx, request);
//! assert_eq!(invocation.execute().await?, 42);
//! # Ok(())
//! # }
//! ```

mod base;
mod clock;
mod context;
mod invocation;

pub use base::{Action, Fingerprint};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::ExecutionContext;
pub use invocation::Invocation;
