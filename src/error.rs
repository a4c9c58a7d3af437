use thiserror::Error;

/// Boxed source error reported by a query backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "request.table", "config.window_ms")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., offending value)
    pub details: Option<String>,
    /// Source of the error (e.g., "stats_trend", "cache_registry")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable error codes surfaced to callers of the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequest,
    QueryExecutionError,
    CacheUnavailable,
    UnknownOperation,
    IllegalState,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::QueryExecutionError => "QUERY_EXECUTION_ERROR",
            Self::CacheUnavailable => "CACHE_UNAVAILABLE",
            Self::UnknownOperation => "UNKNOWN_OPERATION",
            Self::IllegalState => "ILLEGAL_STATE",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::SerializationError => "SERIALIZATION_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for action execution.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid request: {message}{}", format_context(.context))]
    InvalidRequest {
        message: String,
        context: ErrorContext,
    },

    #[error("Query execution error: {message}{}", format_source(.source))]
    QueryExecution {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Cache unavailable: {message}{}", format_context(.context))]
    CacheUnavailable {
        message: String,
        context: ErrorContext,
    },

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Illegal state: {message}{}", format_context(.context))]
    IllegalState {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_source(source: &Option<BoxError>) -> String {
    match source {
        Some(e) => format!(" (caused by: {})", e),
        None => String::new(),
    }
}

impl Error {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Error::InvalidRequest {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn invalid_request_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidRequest {
            message: msg.into(),
            context,
        }
    }

    /// Wrap a backend failure.
    pub fn query_execution(msg: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::QueryExecution {
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    pub fn cache_unavailable_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::CacheUnavailable {
            message: msg.into(),
            context,
        }
    }

    pub fn illegal_state_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::IllegalState {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            Error::QueryExecution { .. } => ErrorCode::QueryExecutionError,
            Error::CacheUnavailable { .. } => ErrorCode::CacheUnavailable,
            Error::UnknownOperation(_) => ErrorCode::UnknownOperation,
            Error::IllegalState { .. } => ErrorCode::IllegalState,
            Error::Configuration { .. } => ErrorCode::ConfigurationError,
            Error::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidRequest { context, .. }
            | Error::CacheUnavailable { context, .. }
            | Error::IllegalState { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}
