//! Normalized call schema shared by every provider adapter.
//!
//! The metrics layer consumes [`InputParameters`] and [`OutputParameters`]
//! without knowing which provider produced them. Field names and optionality
//! are the downstream contract: serialised records keep these names.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Model name recorded when request extraction fails.
pub const UNRESOLVED_MODEL: &str = "NA";

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// Number of tokens consumed in an LLM API call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for TokenCount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

/// Token usage reported by the provider for one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub input_tokens: TokenCount,
    /// Tokens in the completion.
    pub output_tokens: TokenCount,
}

impl TokenUsage {
    /// Creates a [`TokenUsage`] from raw counts.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens: TokenCount::new(input_tokens),
            output_tokens: TokenCount::new(output_tokens),
        }
    }

    /// Sum of input and output tokens.
    pub fn total(self) -> TokenCount {
        self.input_tokens + self.output_tokens
    }
}

// ---------------------------------------------------------------------------
// Request side
// ---------------------------------------------------------------------------

/// One conversation turn rendered into a provider-agnostic form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    /// Speaker role as sent to the provider (`"user"`, `"assistant"`, ...).
    pub role: String,
    /// Message content flattened to plain text.
    pub content: String,
}

impl NormalizedMessage {
    /// Creates a message from a role and flattened content.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Canonical view of an outbound provider call.
///
/// Built by a request extractor from the raw call arguments. `tools` and
/// `tool_descriptions` can only be set together through
/// [`InputParameters::with_tools`], so descriptions never exist without tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputParameters {
    model: Option<String>,
    system: Option<String>,
    max_tokens: Option<u64>,
    input: String,
    messages: Vec<NormalizedMessage>,
    tools: Option<Vec<Value>>,
    tool_descriptions: Option<BTreeMap<String, String>>,
}

impl InputParameters {
    /// Creates parameters for a call to `model` with every other field empty.
    pub fn new(model: Option<String>) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// The minimal record produced when extraction fails: only
    /// `model = "NA"` is set.
    pub fn unresolved() -> Self {
        Self::new(Some(UNRESOLVED_MODEL.to_string()))
    }

    /// Sets the system prompt.
    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    /// Sets the completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: Option<u64>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the representative user-turn input.
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    /// Sets the normalized conversation.
    pub fn with_messages(mut self, messages: Vec<NormalizedMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Sets the raw tool schemas and the name → description lookup built from them.
    ///
    /// `None` tools clears both fields regardless of `tool_descriptions`.
    pub fn with_tools(
        mut self,
        tools: Option<Vec<Value>>,
        tool_descriptions: Option<BTreeMap<String, String>>,
    ) -> Self {
        self.tool_descriptions = tools.as_ref().and(tool_descriptions);
        self.tools = tools;
        self
    }

    /// Model name, or [`UNRESOLVED_MODEL`] after a failed extraction.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Returns `true` if this record came from a failed extraction.
    pub fn is_unresolved(&self) -> bool {
        self.model.as_deref() == Some(UNRESOLVED_MODEL)
    }

    /// System prompt, if any.
    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    /// Completion token limit, if any.
    pub fn max_tokens(&self) -> Option<u64> {
        self.max_tokens
    }

    /// Content of the first user turn; empty when there is none.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Normalized conversation, in call order.
    pub fn messages(&self) -> &[NormalizedMessage] {
        &self.messages
    }

    /// Raw tool schemas passed through from the call.
    pub fn tools(&self) -> Option<&[Value]> {
        self.tools.as_deref()
    }

    /// Tool name → description lookup.
    pub fn tool_descriptions(&self) -> Option<&BTreeMap<String, String>> {
        self.tool_descriptions.as_ref()
    }

    /// Looks up the description of a tool by name.
    pub fn tool_description(&self, name: &str) -> Option<&str> {
        self.tool_descriptions
            .as_ref()
            .and_then(|d| d.get(name))
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Response side
// ---------------------------------------------------------------------------

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name as declared in the request.
    pub name: String,
    /// Arguments the model passed to the tool, verbatim.
    pub input_parameters: Value,
    /// Description from the request's tool schema; `None` if the tool was
    /// not declared with one.
    pub description: Option<String>,
}

/// Canonical view of a provider response.
///
/// Every field is optional. A response that cannot be interpreted yields
/// `OutputParameters::default()` rather than an error.
///
/// `output` switches format depending on `tools_called`: plain text of the
/// first content block when no tools were called, otherwise the first block
/// serialised as JSON. Consumers detect the case by checking
/// `tools_called`, not by parsing `output`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputParameters {
    /// First response content block, opaque to this layer.
    pub content: Option<Value>,
    /// Text or serialised form of the first content block.
    pub output: Option<String>,
    /// Role of the response message (normally `"assistant"`).
    pub role: Option<String>,
    /// Provider object type tag (e.g. `"message"`).
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Token counts for the call.
    pub usage: Option<TokenUsage>,
    /// Tool invocations, in response order; `None` when there were none.
    pub tools_called: Option<Vec<ToolCall>>,
}

impl OutputParameters {
    /// Returns `true` if the model invoked at least one tool.
    pub fn has_tool_calls(&self) -> bool {
        self.tools_called.as_ref().is_some_and(|t| !t.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
