//! Normalized call schema for evalkit.
//!
//! This crate contains every value type, identifier, and error type that the
//! provider adapters produce and the metrics layer consumes. Infrastructure
//! crates implement the port traits defined here; they never add schema
//! rules of their own.
//!
//! ## Architectural Layer
//!
//! **Domain types + port definitions.** This crate has no I/O dependencies.
//! It defines *what* a normalized call looks like; `llm` defines *how* each
//! provider's shapes are mapped onto it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | `ProviderSlug`, `CallId` |
//! | [`types`] | `InputParameters`, `OutputParameters`, `ToolCall`, `TokenUsage`, `Timestamp` |
//! | [`record`] | `CallRecord` |
//! | [`errors`] | Error taxonomy and `RetryPolicy` |
//! | [`ports`] | `MessagesTransport`, `EmbeddingModel`, `CallObserver` |

pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod record;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ConfigurationError, ExtractionError, ProviderError, RetryPolicy, Retryable};
pub use identifiers::{CallId, ProviderSlug, UnknownProvider};
pub use ports::{CallArguments, CallObserver, EmbeddingModel, MessagesTransport};
pub use record::CallRecord;
pub use types::{
    InputParameters, NormalizedMessage, OutputParameters, Timestamp, TokenCount, TokenUsage,
    ToolCall, UNRESOLVED_MODEL,
};
