//! Error types for service broker operations.
//!
//! Every failure a broker call can produce is a variant of [`BrokerError`].
//! Callers that only care about the broad kind match on [`BrokerError::category`].

use std::fmt;

use thiserror::Error;

/// A result type using `BrokerError`.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur while talking to a service broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// No service in the catalog has the requested name.
    #[error("Unknown service with name: {name:?}\n  Known service names: {known:?}")]
    ServiceNotFound {
        /// The name that was looked up.
        name: String,
        /// Every service name the catalog does contain, in catalog order.
        known: Vec<String>,
    },

    /// The service exists but has no plan with the requested name.
    #[error("Unknown plan with name: {name:?}\n  Known plan names are: {known:?}")]
    PlanNotFound {
        /// The service that was searched.
        service: String,
        /// The plan name that was looked up.
        name: String,
        /// Every plan name of that service, in catalog order.
        known: Vec<String>,
    },

    /// A response body could not be decoded.
    #[error("invalid JSON response: {0}")]
    JsonParse(String),

    /// The request did not complete within the transport timeout.
    #[error("request to {uri} timed out: {message}")]
    Timeout {
        /// The request URI.
        uri: String,
        /// The underlying transport message.
        message: String,
    },

    /// The broker answered with a non-2xx status.
    #[error("{uri}\n\n{status}\n\n{body}")]
    Http {
        /// The request URI.
        uri: String,
        /// The HTTP status code.
        status: u16,
        /// The response body, verbatim.
        body: String,
    },

    /// The request failed before a response arrived (connection refused, DNS, TLS).
    #[error("request to {uri} failed: {message}")]
    Transport {
        /// The request URI.
        uri: String,
        /// The underlying transport message.
        message: String,
    },

    /// Invalid client configuration, rejected at construction.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Broad classification of a [`BrokerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A service or plan lookup missed.
    NotInCatalog,
    /// A response body was not the expected JSON.
    JsonParse,
    /// The transport timed out.
    Timeout,
    /// The broker returned a non-2xx status.
    Http,
    /// The transport failed without a response.
    Transport,
    /// The client was misconfigured.
    Config,
}

impl ErrorCategory {
    /// The snake_case tag for this category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotInCatalog => "not_in_catalog",
            Self::JsonParse => "json_parse",
            Self::Timeout => "timeout",
            Self::Http => "http",
            Self::Transport => "transport",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BrokerError {
    /// Returns the category this error belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ServiceNotFound { .. } | Self::PlanNotFound { .. } => ErrorCategory::NotInCatalog,
            Self::JsonParse(_) => ErrorCategory::JsonParse,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Http { .. } => ErrorCategory::Http,
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Returns true for catalog lookup misses (service or plan).
    #[must_use]
    pub const fn is_not_in_catalog(&self) -> bool {
        matches!(self.category(), ErrorCategory::NotInCatalog)
    }

    /// Returns the HTTP status code if the broker responded with one.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse(err.to_string())
    }
}
