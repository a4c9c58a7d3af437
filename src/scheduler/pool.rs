//! Task schedulers.

use super::{ScheduledTask, Scheduler};
use crate::{Error, ErrorContext, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl SchedulerStats {
    pub fn pending(&self) -> u64 {
        self.submitted
            .saturating_sub(self.succeeded)
            .saturating_sub(self.failed)
    }
}

#[derive(Default)]
struct TaskCounters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    idle: Notify,
}

impl TaskCounters {
    fn to_stats(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.submitted.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    async fn run(&self, task: ScheduledTask) {
        let ScheduledTask { label, future } = task;
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
                debug!(task = %label, "Scheduled task finished");
            }
            Ok(Err(e)) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                error!(task = %label, code = %e.code(), error = %e, "Scheduled task failed");
            }
            Err(panic) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                error!(task = %label, panic = %panic_message(panic.as_ref()), "Scheduled task panicked");
            }
        }
        if self.to_stats().pending() == 0 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.to_stats().pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

fn current_handle() -> Result<Handle> {
    Handle::try_current().map_err(|e| {
        Error::configuration_with_context(
            "scheduler requires a tokio runtime",
            ErrorContext::new()
                .with_details(e.to_string())
                .with_source("scheduler"),
        )
    })
}

/// Spawns every task straight onto a tokio runtime.
pub struct TokioScheduler {
    handle: Handle,
    counters: Arc<TaskCounters>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            counters: Arc::new(TaskCounters::default()),
        }
    }

    /// Binds to the runtime of the calling context.
    pub fn current() -> Result<Self> {
        Ok(Self::new(current_handle()?))
    }

    pub async fn wait_idle(&self) {
        self.counters.wait_idle().await
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: ScheduledTask) -> Result<()> {
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        let counters = Arc::clone(&self.counters);
        self.handle.spawn(async move { counters.run(task).await });
        Ok(())
    }

    fn stats(&self) -> SchedulerStats {
        self.counters.to_stats()
    }
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub max_concurrency: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

impl WorkerPoolConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }
}

/// Runs at most `max_concurrency` tasks at a time; the rest queue in order.
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    config: WorkerPoolConfig,
    counters: Arc<TaskCounters>,
}

impl WorkerPool {
    pub fn new(handle: Handle, config: WorkerPoolConfig) -> Result<Self> {
        if config.max_concurrency == 0 {
            return Err(Error::configuration_with_context(
                "worker pool needs at least one worker",
                ErrorContext::new()
                    .with_field_path("scheduler.max_concurrency")
                    .with_source("worker_pool"),
            ));
        }
        Ok(Self {
            handle,
            permits: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
            counters: Arc::new(TaskCounters::default()),
        })
    }

    pub fn current(config: WorkerPoolConfig) -> Result<Self> {
        Self::new(current_handle()?, config)
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn wait_idle(&self) {
        self.counters.wait_idle().await
    }
}

impl Scheduler for WorkerPool {
    fn schedule(&self, task: ScheduledTask) -> Result<()> {
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        let counters = Arc::clone(&self.counters);
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            // the semaphore is never closed, so acquisition only fails on shutdown
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            counters.run(task).await
        });
        Ok(())
    }

    fn stats(&self) -> SchedulerStats {
        self.counters.to_stats()
    }
}
