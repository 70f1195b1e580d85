//! Anthropic Messages API support.
//!
//! The extractors work on plain JSON and are always compiled. The HTTP
//! transport requires the `anthropic` cargo feature.

#[cfg(feature = "anthropic")]
pub mod client;
pub mod render;
pub mod request;
pub mod response;

#[cfg(feature = "anthropic")]
pub use client::{AnthropicClient, AnthropicClientBuilder};
pub use render::{render_messages, stringify_content};
pub use request::{extract_input_parameters, safe_extract_input_parameters};
pub use response::{extract_output_parameters, safe_extract_output_parameters};
