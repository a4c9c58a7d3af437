//! Opcode → action factory registry.

use crate::action::{Action, ExecutionContext, Invocation};
use crate::cache::CacheKey;
use crate::scheduler::Scheduler;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};
use tracing::info;

/// What a registered operation is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub opcode: String,
    pub name: String,
    pub cachable: bool,
}

/// Type-erased constructor and driver for one action type.
///
/// Parameters and responses cross this boundary as JSON values; each call
/// creates a fresh action instance.
#[async_trait]
pub trait ActionFactory: Send + Sync {
    fn descriptor(&self) -> &ActionDescriptor;

    async fn execute(&self, ctx: &ExecutionContext, parameter: Value) -> Result<Value>;

    fn submit(
        &self,
        ctx: &ExecutionContext,
        parameter: Value,
        scheduler: &dyn Scheduler,
    ) -> Result<CacheKey>;

    async fn fetch(&self, ctx: &ExecutionContext, key: &CacheKey) -> Result<Option<Value>>;
}

struct TypedFactory<A, F> {
    descriptor: ActionDescriptor,
    make: F,
    _marker: PhantomData<fn() -> A>,
}

impl<A, F> TypedFactory<A, F>
where
    A: Action,
    F: Fn() -> A + Send + Sync,
{
    fn create(&self) -> Arc<A> {
        Arc::new((self.make)())
    }

    fn decode(&self, parameter: Value) -> Result<A::Parameter> {
        serde_json::from_value(parameter).map_err(|e| {
            Error::invalid_request_with_context(
                "malformed request parameter",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source(self.descriptor.opcode.clone()),
            )
        })
    }
}

#[async_trait]
impl<A, F> ActionFactory for TypedFactory<A, F>
where
    A: Action,
    F: Fn() -> A + Send + Sync + 'static,
{
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &ExecutionContext, parameter: Value) -> Result<Value> {
        let parameter = self.decode(parameter)?;
        let response = Invocation::with_parameter(self.create(), ctx, parameter)
            .execute()
            .await?;
        Ok(serde_json::to_value(response)?)
    }

    fn submit(
        &self,
        ctx: &ExecutionContext,
        parameter: Value,
        scheduler: &dyn Scheduler,
    ) -> Result<CacheKey> {
        let parameter = self.decode(parameter)?;
        Invocation::with_parameter(self.create(), ctx, parameter).submit(scheduler)
    }

    async fn fetch(&self, ctx: &ExecutionContext, key: &CacheKey) -> Result<Option<Value>> {
        let response = Invocation::new(self.create(), ctx).lookup(key).await?;
        response
            .map(|r| serde_json::to_value(r).map_err(Error::from))
            .transpose()
    }
}

/// Resolves opcodes to action factories.
pub struct ActionRegistry {
    factories: RwLock<HashMap<String, Arc<dyn ActionFactory>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `make` under `opcode`. Name and cachability are read from a
    /// throwaway instance.
    pub fn register<A, F>(&self, opcode: impl Into<String>, make: F) -> Result<ActionDescriptor>
    where
        A: Action,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let opcode = opcode.into();
        let sample = make();
        let descriptor = ActionDescriptor {
            opcode: opcode.clone(),
            name: sample.name().to_string(),
            cachable: sample.is_cachable(),
        };

        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        if factories.contains_key(&opcode) {
            return Err(Error::configuration_with_context(
                format!("opcode '{}' is already registered", opcode),
                ErrorContext::new().with_source("action_registry"),
            ));
        }
        factories.insert(
            opcode.clone(),
            Arc::new(TypedFactory {
                descriptor: descriptor.clone(),
                make,
                _marker: PhantomData::<fn() -> A>,
            }),
        );
        info!(opcode = %opcode, action = %descriptor.name, cachable = descriptor.cachable, "Registered action");
        Ok(descriptor)
    }

    pub fn resolve(&self, opcode: &str) -> Result<Arc<dyn ActionFactory>> {
        self.factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(opcode)
            .cloned()
            .ok_or_else(|| Error::UnknownOperation(opcode.to_string()))
    }

    pub fn has(&self, opcode: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(opcode)
    }

    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        let mut list: Vec<_> = self
            .factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|f| f.descriptor().clone())
            .collect();
        list.sort_by(|a, b| a.opcode.cmp(&b.opcode));
        list
    }

    pub fn count(&self) -> usize {
        self.factories.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
