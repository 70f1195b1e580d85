//! Domain identifiers.
//!
//! [`ProviderSlug`] names an LLM or embedding vendor. It keys every
//! provider-specific decision in the workspace: retry policy, credential
//! lookup, and which extractor applies to a call.
//!
//! [`CallId`] identifies a single intercepted provider call so that the
//! request record, response record, and log events can be correlated.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// An external LLM or embedding API vendor.
///
/// The string form (see [`ProviderSlug::as_str`]) is the value accepted in
/// configuration, e.g. in `EVALKIT_SDK_RETRY_PROVIDERS=anthropic,azure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSlug {
    /// Anthropic Messages API.
    Anthropic,
    /// Azure-hosted OpenAI deployments (chat and embeddings).
    Azure,
    /// OpenAI API.
    OpenAi,
    /// Google Gemini API.
    Gemini,
    /// AWS Bedrock.
    Bedrock,
    /// Locally served OpenAI-compatible endpoint (e.g. Ollama).
    Local,
}

impl ProviderSlug {
    /// Every known provider, in declaration order.
    pub const ALL: [ProviderSlug; 6] = [
        ProviderSlug::Anthropic,
        ProviderSlug::Azure,
        ProviderSlug::OpenAi,
        ProviderSlug::Gemini,
        ProviderSlug::Bedrock,
        ProviderSlug::Local,
    ];

    /// Returns the configuration string for this provider.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderSlug::Anthropic => "anthropic",
            ProviderSlug::Azure => "azure",
            ProviderSlug::OpenAi => "openai",
            ProviderSlug::Gemini => "gemini",
            ProviderSlug::Bedrock => "bedrock",
            ProviderSlug::Local => "local",
        }
    }
}

impl std::fmt::Display for ProviderSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderSlug {
    type Err = UnknownProvider;

    /// Parses a provider name case-insensitively, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ProviderSlug::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Identifies a single intercepted provider call.
///
/// Generated fresh for every call; propagated through spans and the
/// [`crate::CallRecord`] so request and response data can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    /// Generates a new random call identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`CallId`] from an existing UUID (e.g. deserialised from a log).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
