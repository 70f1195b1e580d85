//! Error taxonomy and retry-policy types for the evalkit adapter layer.
//!
//! Errors fall into four families, each with a fixed handling rule:
//!
//! | Family | Type | Handling |
//! |--------|------|----------|
//! | Extraction | [`ExtractionError`] | Caught by the safe extractor variants; degraded to a default record |
//! | Network / provider | [`ProviderError`] | Retried per [`RetryPolicy`], then surfaced unchanged |
//! | Configuration | [`ConfigurationError`] | Surfaced at client construction; never retried |
//! | Optional dependency | `llm::AdapterUnavailable` | Surfaced once at install time |
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions implements [`Retryable`] to produce one.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ProviderSlug;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: timeouts, cancellations, connection failures,
///   rate-limit and server-side HTTP responses.
/// - `NonRetryable` errors: authentication failures, invalid requests,
///   malformed responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. from `Retry-After`).
        /// `None` means apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

/// Classifies an error for retry decisions.
pub trait Retryable {
    /// Returns the retry policy that applies to this error.
    fn retry_policy(&self) -> RetryPolicy;
}

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// Failure of a network call to a provider endpoint.
///
/// Surfaced to the caller as-is once retries are exhausted; the retry layer
/// never wraps or reinterprets it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The request (or a single attempt of it) exceeded its deadline.
    #[error("request to provider timed out: {message}")]
    Timeout {
        /// Description of the deadline that elapsed.
        message: String,
    },

    /// The request was cancelled before a response arrived.
    #[error("request to provider was cancelled")]
    Cancelled,

    /// The connection could not be established or was reset.
    #[error("connection to provider failed: {message}")]
    Connection {
        /// Transport-level error description.
        message: String,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated by the transport if very large).
        body: String,
        /// Delay requested by the provider via `Retry-After`, if any.
        retry_after: Option<Duration>,
    },

    /// The provider answered with a body that is not valid JSON.
    #[error("provider response could not be decoded: {message}")]
    InvalidResponse {
        /// Decoder error description.
        message: String,
    },
}

impl Retryable for ProviderError {
    fn retry_policy(&self) -> RetryPolicy {
        match self {
            ProviderError::Timeout { .. }
            | ProviderError::Cancelled
            | ProviderError::Connection { .. } => RetryPolicy::Retryable { after: None },
            ProviderError::Http {
                status,
                retry_after,
                ..
            } => {
                if matches!(*status, 408 | 409 | 429) || *status >= 500 {
                    RetryPolicy::Retryable {
                        after: *retry_after,
                    }
                } else {
                    RetryPolicy::NonRetryable
                }
            }
            ProviderError::InvalidResponse { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction errors
// ---------------------------------------------------------------------------

/// A provider call or response did not have the shape an extractor expects.
///
/// Produced by the strict extractors only; the safe variants turn it into a
/// documented default record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// A field required for extraction is absent.
    #[error("missing field '{field}'")]
    MissingField {
        /// Dotted path of the missing field, e.g. `messages[2].role`.
        field: String,
    },

    /// A field is present but has the wrong JSON type.
    #[error("field '{field}' is not {expected}")]
    UnexpectedType {
        /// Dotted path of the offending field.
        field: String,
        /// Human-readable description of the expected type.
        expected: &'static str,
    },
}

impl ExtractionError {
    /// Creates a [`ExtractionError::MissingField`].
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a [`ExtractionError::UnexpectedType`].
    pub fn unexpected(field: impl Into<String>, expected: &'static str) -> Self {
        Self::UnexpectedType {
            field: field.into(),
            expected,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// A provider client could not be constructed from the available configuration.
///
/// A missing key is not retryable, so these errors are raised at construction
/// time and never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A credential required by the provider resolved to nothing.
    #[error(
        "missing {setting} for {provider}: pass it explicitly, set {env_var}, \
         or store it with `evalkit settings set {setting} <value> --persist`"
    )]
    MissingCredential {
        /// Provider whose client was being constructed.
        provider: ProviderSlug,
        /// Settings key of the missing credential.
        setting: String,
        /// Environment variable that would have supplied it.
        env_var: String,
    },

    /// A configured value could not be used.
    #[error("invalid value for {setting}: {message}")]
    InvalidValue {
        /// Settings key or parameter name.
        setting: String,
        /// Description of the problem.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> ProviderError {
        ProviderError::Http {
            status,
            body: String::new(),
            retry_after: None,
        }
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(ProviderError::Cancelled.retry_policy().is_retryable());
        assert!(ProviderError::Timeout {
            message: "30s".into()
        }
        .retry_policy()
        .is_retryable());
        for status in [408, 409, 429, 500, 502, 503, 529] {
            assert!(http(status).retry_policy().is_retryable(), "{status}");
        }
    }

    #[test]
    fn client_errors_are_not_retryable() {
        for status in [400, 401, 403, 404, 422] {
            assert_eq!(http(status).retry_policy(), RetryPolicy::NonRetryable);
        }
        let decode = ProviderError::InvalidResponse {
            message: "eof".into(),
        };
        assert_eq!(decode.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn retry_after_is_carried_into_the_policy() {
        let err = ProviderError::Http {
            status: 429,
            body: "slow down".into(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(
            err.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(3))
            }
        );
    }

    #[test]
    fn missing_credential_message_names_the_env_var() {
        let err = ConfigurationError::MissingCredential {
            provider: ProviderSlug::Azure,
            setting: "azure_openai_api_key".into(),
            env_var: "AZURE_OPENAI_API_KEY".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("AZURE_OPENAI_API_KEY"));
        assert!(msg.contains("azure"));
    }
}
