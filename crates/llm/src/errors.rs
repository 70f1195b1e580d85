//! Errors raised while constructing provider clients or installing adapters.
//!
//! Call-time failures use [`schema::ProviderError`]; the types here only
//! occur before the first request is sent.

use schema::{ConfigurationError, ProviderSlug};
use thiserror::Error;

/// A provider client could not be built.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Required configuration is missing or invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The HTTP client could not be initialised (e.g. TLS backend failure).
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// The private runtime backing a blocking client could not be started.
    #[error("failed to start runtime for blocking client: {0}")]
    Runtime(#[from] std::io::Error),
}

/// A provider adapter is not compiled into this build.
///
/// Returned by [`crate::intercept::install`] when the adapter's cargo feature
/// is disabled. Other adapters and the extractors keep working.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider} adapter is unavailable: {guidance}")]
pub struct AdapterUnavailable {
    /// Provider whose adapter is missing.
    pub provider: ProviderSlug,
    /// What the user has to do to enable it.
    pub guidance: String,
}
