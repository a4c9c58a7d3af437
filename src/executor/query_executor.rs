use super::registry::{ActionDescriptor, ActionRegistry};
use crate::action::ExecutionContext;
use crate::cache::CacheKey;
use crate::config::ExecutorConfig;
use crate::scheduler::{Scheduler, SchedulerStats, TokioScheduler, WorkerPool, WorkerPoolConfig};
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Request envelope: the opcode next to the action's own parameter fields.
///
/// ```json
/// { "opcode": "statstrend", "table": "clicks", "field": "latency" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    pub opcode: String,
    #[serde(flatten)]
    pub parameter: Map<String, Value>,
}

impl ActionRequest {
    pub fn from_value(request: Value) -> Result<Self> {
        serde_json::from_value(request).map_err(|e| {
            Error::invalid_request_with_context(
                "request must be an object carrying an opcode",
                ErrorContext::new()
                    .with_field_path("request.opcode")
                    .with_details(e.to_string()),
            )
        })
    }
}

/// Routes requests to registered actions and drives them.
pub struct QueryExecutor {
    registry: Arc<ActionRegistry>,
    ctx: ExecutionContext,
    scheduler: Arc<dyn Scheduler>,
}

impl QueryExecutor {
    pub fn new(
        registry: Arc<ActionRegistry>,
        ctx: ExecutionContext,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            registry,
            ctx,
            scheduler,
        }
    }

    /// Builds the context and scheduler described by `config`.
    ///
    /// The caches live in the process-wide registry, switched to the
    /// configured backend. Must be called from within a tokio runtime.
    pub fn from_config(registry: Arc<ActionRegistry>, config: &ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let caches = crate::cache::global_cache_registry();
        caches.set_factory(config.cache_factory());
        let ctx = ExecutionContext::new(caches).with_window(config.window());

        let scheduler: Arc<dyn Scheduler> = match config.scheduler.max_concurrency {
            Some(n) => Arc::new(WorkerPool::current(
                WorkerPoolConfig::new().with_max_concurrency(n),
            )?),
            None => Arc::new(TokioScheduler::current()?),
        };
        info!(
            window_ms = config.window_ms,
            cache_backend = ?config.cache.backend,
            max_concurrency = ?config.scheduler.max_concurrency,
            "Query executor configured"
        );
        Ok(Self::new(registry, ctx, scheduler))
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.registry.descriptors()
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Runs `opcode` inline and returns its response.
    pub async fn execute(&self, opcode: &str, parameter: Value) -> Result<Value> {
        let factory = self.registry.resolve(opcode)?;
        debug!(opcode, "Dispatching sync action");
        factory.execute(&self.ctx, parameter).await
    }

    /// Schedules `opcode` and returns the key to poll with [`QueryExecutor::fetch`].
    pub fn execute_async(&self, opcode: &str, parameter: Value) -> Result<CacheKey> {
        let factory = self.registry.resolve(opcode)?;
        let key = factory.submit(&self.ctx, parameter, self.scheduler.as_ref())?;
        debug!(opcode, key = %key, "Dispatched async action");
        Ok(key)
    }

    /// Reads a result without executing anything.
    pub async fn fetch(&self, opcode: &str, key: &CacheKey) -> Result<Option<Value>> {
        let factory = self.registry.resolve(opcode)?;
        factory.fetch(&self.ctx, key).await
    }

    pub async fn execute_request(&self, request: Value) -> Result<Value> {
        let request = ActionRequest::from_value(request)?;
        self.execute(&request.opcode, Value::Object(request.parameter))
            .await
    }

    pub fn execute_request_async(&self, request: Value) -> Result<CacheKey> {
        let request = ActionRequest::from_value(request)?;
        self.execute_async(&request.opcode, Value::Object(request.parameter))
    }
}
