//! 异步调度模块：后台执行动作计算，结果仅通过缓存传递。
//!
//! # Background Scheduling
//!
//! Async submissions hand a zero-argument unit of work to a [`Scheduler`].
//! The caller never observes the task's result directly: a successful task
//! writes into the action's cache, a failed one is logged and counted.
//!
//! | Scheduler | Behavior |
//! |-----------|----------|
//! | [`TokioScheduler`] | Unbounded: every task is spawned immediately |
//! | [`WorkerPool`] | Bounded: at most `max_concurrency` tasks run at once |

mod pool;

pub use pool::{SchedulerStats, TokioScheduler, WorkerPool, WorkerPoolConfig};

use crate::Result;
use futures::future::BoxFuture;
use std::future::Future;

/// A labelled unit of background work.
pub struct ScheduledTask {
    pub label: String,
    pub future: BoxFuture<'static, Result<()>>,
}

impl ScheduledTask {
    pub fn new<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            future: Box::pin(future),
        }
    }
}

pub trait Scheduler: Send + Sync {
    /// Enqueues `task` without waiting for it to start.
    fn schedule(&self, task: ScheduledTask) -> Result<()>;

    fn stats(&self) -> SchedulerStats {
        SchedulerStats::default()
    }
}
