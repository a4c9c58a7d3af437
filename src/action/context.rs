use super::clock::{Clock, SystemClock};
use crate::cache::{global_cache_registry, CacheRegistry, TimeWindow};
use std::sync::Arc;

/// Everything an invocation needs from its surroundings: where caches live,
/// what time it is, and how wide a key bucket is.
#[derive(Clone)]
pub struct ExecutionContext {
    registry: Arc<CacheRegistry>,
    clock: Arc<dyn Clock>,
    window: TimeWindow,
}

impl ExecutionContext {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self {
            registry,
            clock: Arc::new(SystemClock),
            window: TimeWindow::default(),
        }
    }

    /// Context backed by the process-wide cache registry.
    pub fn global() -> Self {
        Self::new(global_cache_registry())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::global()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("caches", &self.registry.names())
            .field("window_ms", &self.window.as_millis())
            .finish()
    }
}
