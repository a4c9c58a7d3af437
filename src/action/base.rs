//! Action and request contracts.

use crate::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Deterministic seed for cache keys, derived from a request's semantic content.
///
/// Two requests that mean the same thing must produce the same fingerprint;
/// object identity must never leak into it.
pub trait Fingerprint {
    fn fingerprint(&self) -> String;
}

/// One category of analytics query.
///
/// Implementors supply the computation and declare whether results may be
/// cached. Cache keys, single-flight and sync/async orchestration live in
/// [`super::Invocation`].
#[async_trait]
pub trait Action: Send + Sync + 'static {
    type Parameter: Fingerprint + Clone + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Response: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Logical name; selects the dedicated cache.
    fn name(&self) -> &str;

    fn is_cachable(&self) -> bool;

    /// Runs the query against the backend.
    ///
    /// Validation and normalization of `parameter` happen here: malformed
    /// requests fail with [`crate::Error::InvalidRequest`], backend failures
    /// with [`crate::Error::QueryExecution`].
    async fn compute(&self, parameter: Self::Parameter) -> Result<Self::Response>;
}
