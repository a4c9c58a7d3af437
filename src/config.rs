//! Executor configuration.
//!
//! Loaded from YAML, then adjusted by `QUERY_ACTION_*` environment variables:
//!
//! ```yaml
//! window_ms: 30000
//! cache:
//!   backend: memory     # memory | null
//!   max_entries: 10000
//!   ttl_seconds: 600    # optional
//! scheduler:
//!   max_concurrency: 8  # omit for an unbounded scheduler
//! ```

use crate::cache::{
    CacheBackend, CacheFactory, MemoryCacheFactory, NullCacheFactory, TimeWindow,
    DEFAULT_WINDOW_MS,
};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const ENV_CONFIG_PATH: &str = "QUERY_ACTION_CONFIG";
pub const ENV_WINDOW_MS: &str = "QUERY_ACTION_WINDOW_MS";
pub const ENV_CACHE_BACKEND: &str = "QUERY_ACTION_CACHE_BACKEND";
pub const ENV_CACHE_MAX_ENTRIES: &str = "QUERY_ACTION_CACHE_MAX_ENTRIES";
pub const ENV_MAX_CONCURRENCY: &str = "QUERY_ACTION_MAX_CONCURRENCY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Null,
}

impl std::str::FromStr for CacheBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "null" | "none" => Ok(Self::Null),
            other => Err(Error::configuration_with_context(
                format!("unknown cache backend '{}'", other),
                ErrorContext::new().with_field_path("cache.backend"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub max_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            max_entries: 10_000,
            ttl_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub window_ms: u64,
    pub cache: CacheSettings,
    pub scheduler: SchedulerSettings,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            cache: CacheSettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

/// The backend factory selected by [`CacheSettings`].
#[derive(Debug, Clone)]
pub enum ConfiguredCacheFactory {
    Memory(MemoryCacheFactory),
    Null(NullCacheFactory),
}

impl CacheFactory for ConfiguredCacheFactory {
    fn create_cache_for(&self, name: &str) -> Arc<dyn CacheBackend> {
        match self {
            Self::Memory(f) => f.create_cache_for(name),
            Self::Null(f) => f.create_cache_for(name),
        }
    }
}

impl ExecutorConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                "invalid executor configuration",
                ErrorContext::new().with_details(e.to_string()),
            )
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read {}", path.display()),
                ErrorContext::new().with_details(e.to_string()),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// File named by `QUERY_ACTION_CONFIG` (defaults otherwise), then env overrides.
    pub fn from_env() -> Result<Self> {
        let config = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => {
                info!(path = %path, "Loading executor configuration");
                Self::from_file(path)?
            }
            Err(_) => Self::default(),
        };
        let config = config.with_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, keyed by the `QUERY_ACTION_*` names.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_WINDOW_MS) {
            self.window_ms = parse_number(ENV_WINDOW_MS, &v)?;
            info!("Window override: {}ms", self.window_ms);
        }
        if let Some(v) = lookup(ENV_CACHE_BACKEND) {
            self.cache.backend = v.parse()?;
            info!("Cache backend override: {:?}", self.cache.backend);
        }
        if let Some(v) = lookup(ENV_CACHE_MAX_ENTRIES) {
            self.cache.max_entries = parse_number(ENV_CACHE_MAX_ENTRIES, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_CONCURRENCY) {
            self.scheduler.max_concurrency = Some(parse_number(ENV_MAX_CONCURRENCY, &v)?);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            return Err(Error::configuration_with_context(
                "window must be at least 1ms",
                ErrorContext::new().with_field_path("window_ms"),
            ));
        }
        if self.cache.backend == CacheBackendKind::Memory && self.cache.max_entries == 0 {
            return Err(Error::configuration_with_context(
                "memory cache needs room for at least one entry",
                ErrorContext::new().with_field_path("cache.max_entries"),
            ));
        }
        if self.scheduler.max_concurrency == Some(0) {
            return Err(Error::configuration_with_context(
                "worker pool needs at least one worker",
                ErrorContext::new().with_field_path("scheduler.max_concurrency"),
            ));
        }
        Ok(())
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_millis(self.window_ms)
    }

    pub fn cache_factory(&self) -> ConfiguredCacheFactory {
        match self.cache.backend {
            CacheBackendKind::Memory => {
                let factory = MemoryCacheFactory::new(self.cache.max_entries);
                ConfiguredCacheFactory::Memory(match self.cache.ttl_seconds {
                    Some(ttl) => factory.with_ttl(Duration::from_secs(ttl)),
                    None => factory,
                })
            }
            CacheBackendKind::Null => ConfiguredCacheFactory::Null(NullCacheFactory),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        Error::configuration_with_context(
            format!("invalid value for {}", name),
            ErrorContext::new().with_details(format!("'{}': {}", raw, e)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.window_ms, 30_000);
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert!(config.scheduler.max_concurrency.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ExecutorConfig::from_yaml_str(
            "cache:\n  backend: null\nscheduler:\n  max_concurrency: 4\n",
        )
        .unwrap();
        assert_eq!(config.window_ms, 30_000);
        assert_eq!(config.cache.backend, CacheBackendKind::Null);
        assert_eq!(config.cache.max_entries, 10_000);
        assert_eq!(config.scheduler.max_concurrency, Some(4));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_WINDOW_MS, "60000"),
            (ENV_CACHE_BACKEND, "NULL"),
            (ENV_MAX_CONCURRENCY, "2"),
        ]
        .into_iter()
        .collect();
        let config = ExecutorConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.window().as_millis(), 60_000);
        assert_eq!(config.cache.backend, CacheBackendKind::Null);
        assert_eq!(config.scheduler.max_concurrency, Some(2));
    }

    #[test]
    fn test_bad_override_is_configuration_error() {
        let err = ExecutorConfig::default()
            .with_overrides(|k| (k == ENV_WINDOW_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = ExecutorConfig::default();
        config.window_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ExecutorConfig::default();
        config.scheduler.max_concurrency = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_factory_follows_backend() {
        let mut config = ExecutorConfig::default();
        assert_eq!(config.cache_factory().create_cache_for("x").name(), "memory");
        config.cache.backend = CacheBackendKind::Null;
        assert_eq!(config.cache_factory().create_cache_for("x").name(), "null");
    }
}
