//! evalkit LLM provider adapters.
//!
//! Turns provider-specific call arguments and responses into the normalized
//! [`schema`] records, applies per-provider retry policies around network
//! calls, and offers an opt-in wrapper that does both transparently.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing, and back-off live here. The [`schema`] crate sees only the
//! [`schema::MessagesTransport`] and [`schema::EmbeddingModel`] ports.
//!
//! ## Opting in
//!
//! ```no_run
//! # async fn demo(settings: &settings::Settings) -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use llm::{intercept, AnthropicClient, TracingObserver};
//!
//! let adapter = intercept::install()?;
//! let client = adapter.wrap(
//!     AnthropicClient::builder().build(settings)?,
//!     settings,
//!     Arc::new(TracingObserver),
//! );
//! let args = serde_json::json!({
//!     "model": "claude-sonnet-4-5",
//!     "max_tokens": 256,
//!     "messages": [{"role": "user", "content": "Hello"}]
//! });
//! if let serde_json::Value::Object(args) = args {
//!     let _raw = client.create_message(&args).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`anthropic`] | Messages request/response extractors and the HTTP transport |
//! | [`azure`] | `AzureEmbeddingModel` |
//! | [`retry`] | `build_retry_decorator`, `RetryDecorator`, `sdk_retries_for` |
//! | [`intercept`] | `install`, `AnthropicAdapter`, instrumented clients |
//! | [`observer`] | `RecordingObserver`, `TracingObserver` |
//! | [`errors`] | `ClientError`, `AdapterUnavailable` |

pub mod anthropic;
pub mod azure;
pub mod errors;
mod http;
pub mod intercept;
pub mod observer;
pub mod retry;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicClient;
pub use azure::{AzureEmbeddingConfig, AzureEmbeddingModel, BlockingAzureEmbeddingModel};
pub use errors::{AdapterUnavailable, ClientError};
pub use intercept::{install, AnthropicAdapter, BlockingInstrumentedClient, InstrumentedClient};
pub use observer::{RecordingObserver, TracingObserver};
pub use retry::{build_retry_decorator, client_max_retries, sdk_retries_for, RetryDecorator};
