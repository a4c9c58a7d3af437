//! Cache-through and fire-and-poll execution of a single action request.

use super::base::{Action, Fingerprint};
use super::clock::Clock;
use super::context::ExecutionContext;
use crate::cache::{Cache, CacheKey, TimeWindow};
use crate::scheduler::{ScheduledTask, Scheduler};
use crate::{Error, ErrorContext, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, warn};

/// One request against one action.
///
/// Owns the bound parameter and the memoized cache key. The key is derived
/// on first use from the parameter fingerprint and the current time bucket,
/// and never changes afterwards; rebinding the parameter is only allowed
/// before that point.
pub struct Invocation<A: Action> {
    action: Arc<A>,
    parameter: Option<A::Parameter>,
    key: OnceCell<CacheKey>,
    cache: Option<Cache<A::Response>>,
    clock: Arc<dyn Clock>,
    window: TimeWindow,
}

impl<A: Action> Invocation<A> {
    /// Creates an unbound invocation. The named cache is acquired only for
    /// cachable actions.
    pub fn new(action: Arc<A>, ctx: &ExecutionContext) -> Self {
        let cache = if action.is_cachable() {
            Some(ctx.registry().cache_for(action.name()))
        } else {
            None
        };
        Self {
            action,
            parameter: None,
            key: OnceCell::new(),
            cache,
            clock: Arc::clone(ctx.clock()),
            window: ctx.window(),
        }
    }

    pub fn with_parameter(action: Arc<A>, ctx: &ExecutionContext, parameter: A::Parameter) -> Self {
        let mut invocation = Self::new(action, ctx);
        invocation.parameter = Some(parameter);
        invocation
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn parameter(&self) -> Option<&A::Parameter> {
        self.parameter.as_ref()
    }

    pub fn is_cachable(&self) -> bool {
        self.cache.is_some()
    }

    pub fn is_key_memoized(&self) -> bool {
        self.key.get().is_some()
    }

    /// Returns the memoized key, deriving it on first call.
    pub fn cache_key(&self) -> Result<CacheKey> {
        self.key
            .get_or_try_init(|| {
                let parameter = self.bound_parameter()?;
                let key = self
                    .window
                    .key_for(&parameter.fingerprint(), self.clock.now_millis());
                debug!(action = self.action.name(), key = %key, "Derived cache key");
                Ok(key)
            })
            .cloned()
    }

    /// Replaces the bound parameter. Fails once the key has been derived,
    /// since the key would no longer describe the parameter.
    pub fn rebind(&mut self, parameter: A::Parameter) -> Result<()> {
        if let Some(key) = self.key.get() {
            return Err(Error::illegal_state_with_context(
                "cannot rebind parameter after the cache key was derived",
                ErrorContext::new()
                    .with_details(format!("memoized key {}", key))
                    .with_source(self.action.name()),
            ));
        }
        self.parameter = Some(parameter);
        Ok(())
    }

    /// Reads a previously computed result for an arbitrary key.
    pub async fn lookup(&self, key: &CacheKey) -> Result<Option<A::Response>> {
        self.cache()?.get(key).await
    }

    /// Computes the result inline.
    ///
    /// Cachable actions go through the cache: a hit returns the stored value
    /// without touching the backend, concurrent misses on the same key run
    /// the backend once. Non-cachable actions always run the backend.
    pub async fn execute(&self) -> Result<A::Response> {
        let parameter = self.bound_parameter()?.clone();
        match &self.cache {
            None => self.action.compute(parameter).await,
            Some(cache) => {
                let key = self.cache_key()?;
                compute_through(self.action.as_ref(), cache, &key, parameter).await
            }
        }
    }

    /// Schedules the computation and returns the key to poll with
    /// [`Invocation::lookup`]. The result lands in the cache once the task
    /// succeeds; a failed task writes nothing.
    pub fn submit(&self, scheduler: &dyn Scheduler) -> Result<CacheKey> {
        let cache = self.cache()?.clone();
        let key = self.cache_key()?;
        let parameter = self.bound_parameter()?.clone();
        let action = Arc::clone(&self.action);

        let task_key = key.clone();
        let label = format!("{}:{}", action.name(), key);
        scheduler.schedule(ScheduledTask::new(label, async move {
            compute_through(action.as_ref(), &cache, &task_key, parameter)
                .await
                .map(|_| ())
        }))?;
        debug!(action = self.action.name(), key = %key, "Submitted async computation");
        Ok(key)
    }

    /// Rebinds, then submits.
    pub fn submit_with(&mut self, parameter: A::Parameter, scheduler: &dyn Scheduler) -> Result<CacheKey> {
        self.rebind(parameter)?;
        self.submit(scheduler)
    }

    fn bound_parameter(&self) -> Result<&A::Parameter> {
        self.parameter.as_ref().ok_or_else(|| {
            Error::illegal_state_with_context(
                "no parameter bound to invocation",
                ErrorContext::new().with_source(self.action.name()),
            )
        })
    }

    fn cache(&self) -> Result<&Cache<A::Response>> {
        self.cache.as_ref().ok_or_else(|| {
            Error::cache_unavailable_with_context(
                "action results are not cachable",
                ErrorContext::new().with_source(self.action.name()),
            )
        })
    }
}

/// Hit, or compute once under the key's in-flight lock, store and share with waiters.
async fn compute_through<A: Action>(
    action: &A,
    cache: &Cache<A::Response>,
    key: &CacheKey,
    parameter: A::Parameter,
) -> Result<A::Response> {
    if let Some(hit) = read_or_miss(cache, key).await {
        debug!(action = action.name(), key = %key, "Cache hit");
        return Ok(hit);
    }

    if cache.is_key_contended(key) {
        debug!(action = action.name(), key = %key, "Waiting on in-flight computation");
    }
    let mut in_flight = cache.lock_key(key).await;
    if let Some(shared) = in_flight.outcome::<A::Response>() {
        debug!(action = action.name(), key = %key, "Took result of concurrent computation");
        return Ok(shared);
    }
    if let Some(hit) = read_or_miss(cache, key).await {
        debug!(action = action.name(), key = %key, "Cache filled by concurrent computation");
        return Ok(hit);
    }

    debug!(action = action.name(), key = %key, "Cache miss, running backend");
    let result = action.compute(parameter).await?;
    let stored = cache.put(key, result).await?;
    // waiters queued on this key may find nothing in a non-retaining backend
    in_flight.publish(stored.clone());
    Ok(stored)
}

// Read failures degrade to a miss so the request can still be answered.
async fn read_or_miss<V>(cache: &Cache<V>, key: &CacheKey) -> Option<V>
where
    V: serde::Serialize + serde::de::DeserializeOwned,
{
    match cache.get(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(cache = cache.name(), key = %key, error = %e, "Cache read failed, recomputing");
            None
        }
    }
}
