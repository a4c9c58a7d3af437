//! 查询分发模块：根据操作码解析动作并同步或异步执行。
//!
//! # Query Dispatch
//!
//! [`ActionRegistry`] maps operation codes to action factories;
//! [`QueryExecutor`] resolves a request through it and runs the action
//! synchronously ([`QueryExecutor::execute`]), asynchronously
//! ([`QueryExecutor::execute_async`]), or polls a prior async result
//! ([`QueryExecutor::fetch`]). Unregistered opcodes fail with
//! [`crate::Error::UnknownOperation`].

mod query_executor;
mod registry;

pub use query_executor::{ActionRequest, QueryExecutor};
pub use registry::{ActionDescriptor, ActionFactory, ActionRegistry};
