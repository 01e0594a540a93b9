//! Error types for orgchat.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application, plus the closed set of categories that external
//! service clients report failures with.

use std::fmt;
use thiserror::Error;

/// Category of a failed call to an external service (LLM, knowledge, embeddings).
///
/// Service clients classify failures once, at the transport boundary, so that
/// retry and degradation decisions never have to inspect raw error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// Connection refused, reset, DNS failure...
    Network,
    /// Request or gateway timeout
    Timeout,
    /// HTTP 429 without a quota marker
    RateLimit,
    /// HTTP 5xx
    Server,
    /// Quota or billing limit exhausted for the requested model
    Quota,
    /// Any other 4xx; the request itself is wrong
    Client,
    /// The service answered but the payload could not be decoded
    InvalidResponse,
}

impl ServiceErrorKind {
    /// Whether a failure of this kind may succeed when attempted again.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimit | Self::Server | Self::Quota
        )
    }

    /// Classify an HTTP status code. `quota_marker` is set by the caller when
    /// the structured error body identifies an exhausted quota.
    pub fn from_status(status: u16, quota_marker: bool) -> Self {
        match status {
            402 => Self::Quota,
            429 if quota_marker => Self::Quota,
            429 => Self::RateLimit,
            408 | 504 => Self::Timeout,
            500..=599 => Self::Server,
            _ => Self::Client,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::Server => "server",
            Self::Quota => "quota",
            Self::Client => "client",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for orgchat.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure of an external service call, already classified
    #[error("{service} error ({kind}): {message}")]
    Service {
        service: &'static str,
        kind: ServiceErrorKind,
        message: String,
    },

    /// Inbound request rejected before any processing
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Prompt rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a classified service error.
    pub fn service(
        service: &'static str,
        kind: ServiceErrorKind,
        message: impl Into<String>,
    ) -> Self {
        AppError::Service {
            service,
            kind,
            message: message.into(),
        }
    }

    /// The service error category, if this is a service failure.
    pub fn service_kind(&self) -> Option<ServiceErrorKind> {
        match self {
            AppError::Service { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the retry controller should attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        self.service_kind().is_some_and(ServiceErrorKind::is_retryable)
    }

    /// Whether this failure means the current model's quota is exhausted.
    pub fn is_quota_exceeded(&self) -> bool {
        self.service_kind() == Some(ServiceErrorKind::Quota)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
