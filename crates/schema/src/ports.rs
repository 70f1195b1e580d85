//! Port traits implemented by the infrastructure crates.
//!
//! The `llm` crate supplies transports and embedding models; callers supply
//! observers. Nothing here performs I/O.

use async_trait::async_trait;
use serde_json::Value;

use crate::{CallRecord, ProviderError, ProviderSlug};

/// Raw keyword arguments of an outbound chat call, passed to the provider
/// unmodified (`model`, `system`, `max_tokens`, `tools`, `messages`, ...).
pub type CallArguments = serde_json::Map<String, Value>;

/// A network client for a provider's chat/messages endpoint.
///
/// Implementations send the arguments verbatim and return the raw response
/// body. They must not interpret the response beyond decoding JSON.
#[async_trait]
pub trait MessagesTransport: Send + Sync {
    /// Provider served by this transport.
    fn provider(&self) -> ProviderSlug;

    /// Sends one request. Any retries are the transport's native ones.
    async fn create_message(&self, arguments: &CallArguments) -> Result<Value, ProviderError>;
}

/// A provider-backed text embedding model.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Model (or deployment) name sent with each request.
    fn model_name(&self) -> &str;

    /// Embeds a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embeds a batch of texts, preserving order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Receives the evaluation record of each intercepted call.
///
/// Called synchronously on the calling task after the provider call returns;
/// implementations should not block.
pub trait CallObserver: Send + Sync {
    /// Handles one completed call.
    fn on_call(&self, record: &CallRecord);
}
