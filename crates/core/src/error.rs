//! Error taxonomy for gateway operations.
//!
//! Every public SDK operation returns [`GatewayResult`]. Transient failures
//! are retried inside the transport and never surface individually; what the
//! caller sees is the final classification after retries are exhausted.

use std::time::Duration;

use thiserror::Error;

/// Categories of gateway errors, used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Login/refresh failure or missing credentials - never retried here,
    /// the auth session owns its own fallback ladder.
    Authentication,
    /// Caller-side misuse (limit out of range, bad api path) - non-retryable.
    Validation,
    /// Rate limiting (429) - retryable, honoring Retry-After when present.
    RateLimit,
    /// Server errors (5xx) - retryable.
    Server,
    /// Client errors (4xx except 429) - non-retryable.
    Client,
    /// Transport failures and timeouts - retryable.
    Network,
    /// Referenced entity/scope does not exist - non-retryable.
    NotFound,
    /// SDK misconfiguration - non-retryable.
    Config,
}

/// Errors surfaced by the datagate SDK.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Login or refresh failed, or credentials are missing.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Malformed query parameters or api path.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport-level failure after retries were exhausted.
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded its timeout after retries were exhausted.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP 429 after retries were exhausted.
    #[error("rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        /// Server-supplied Retry-After hint, in seconds.
        retry_after: Option<u64>,
    },

    /// Generic non-2xx response.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Referenced entity or scope does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// Metadata call failed, wrapping the underlying error with context.
    #[error("metadata request for '{entity}' failed: {source}")]
    Metadata {
        entity: String,
        #[source]
        source: Box<GatewayError>,
    },

    /// Query call failed, wrapping the underlying error with context.
    #[error("query against '{entity}' failed: {source}")]
    Query {
        entity: String,
        #[source]
        source: Box<GatewayError>,
    },

    /// SDK configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Get the error category for this error.
    ///
    /// Context wrappers ([`GatewayError::Metadata`], [`GatewayError::Query`])
    /// delegate to the error they wrap.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Network(_) | Self::Timeout(_) => ErrorCategory::Network,
            Self::RateLimit { .. } => ErrorCategory::RateLimit,
            Self::Api { status, .. } if *status >= 500 => ErrorCategory::Server,
            Self::Api { .. } => ErrorCategory::Client,
            Self::EntityNotFound(_) => ErrorCategory::NotFound,
            Self::Metadata { source, .. } | Self::Query { source, .. } => source.category(),
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Check if the failed operation may be retried.
    ///
    /// Only transport errors, timeouts, 5xx responses, and 429 qualify;
    /// authentication failures and 4xx responses never do.
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::RateLimit | ErrorCategory::Server
        )
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimit { .. } => Some(429),
            Self::Metadata { source, .. } | Self::Query { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Wrap this error with metadata-call context.
    pub fn metadata_context(self, entity: impl Into<String>) -> Self {
        Self::Metadata { entity: entity.into(), source: Box::new(self) }
    }

    /// Wrap this error with query-call context.
    pub fn query_context(self, entity: impl Into<String>) -> Self {
        Self::Query { entity: entity.into(), source: Box::new(self) }
    }
}
