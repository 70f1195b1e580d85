//! Request extraction for the Anthropic Messages API.

use std::collections::BTreeMap;

use schema::{CallArguments, ExtractionError, InputParameters};
use serde_json::Value;
use tracing::debug;

use super::render::{render_messages, stringify_content};

/// Like [`extract_input_parameters`], but a malformed call shape yields
/// [`InputParameters::unresolved`] instead of an error.
pub fn safe_extract_input_parameters(arguments: &CallArguments) -> InputParameters {
    match extract_input_parameters(arguments) {
        Ok(params) => params,
        Err(err) => {
            debug!(error = %err, "Unrecognised Messages call shape; recording unresolved input");
            InputParameters::unresolved()
        }
    }
}

/// Extracts the canonical request from the keyword arguments of a Messages
/// call. Absent keys, and keys set to `null`, default to empty values.
pub fn extract_input_parameters(
    arguments: &CallArguments,
) -> Result<InputParameters, ExtractionError> {
    let model = optional_str(arguments, "model")?.map(str::to_owned);
    let system = match present(arguments, "system") {
        Some(system) => Some(stringify_content(system, "system")?),
        None => None,
    };
    let max_tokens = match present(arguments, "max_tokens") {
        Some(value) => Some(
            value
                .as_u64()
                .ok_or_else(|| ExtractionError::unexpected("max_tokens", "a non-negative integer"))?,
        ),
        None => None,
    };

    let tools = match present(arguments, "tools") {
        Some(Value::Array(tools)) => Some(tools.clone()),
        Some(_) => return Err(ExtractionError::unexpected("tools", "an array")),
        None => None,
    };
    let tool_descriptions = match tools.as_deref() {
        Some(tools) if !tools.is_empty() => Some(describe_tools(tools)?),
        _ => None,
    };

    let messages: &[Value] = match present(arguments, "messages") {
        Some(Value::Array(messages)) => messages,
        Some(_) => return Err(ExtractionError::unexpected("messages", "an array")),
        None => &[],
    };
    let rendered = render_messages(messages)?;
    let input = rendered
        .iter()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .unwrap_or_default();

    Ok(InputParameters::new(model)
        .with_system(system)
        .with_max_tokens(max_tokens)
        .with_input(input)
        .with_messages(rendered)
        .with_tools(tools, tool_descriptions))
}

fn describe_tools(tools: &[Value]) -> Result<BTreeMap<String, String>, ExtractionError> {
    let mut descriptions = BTreeMap::new();
    for (i, tool) in tools.iter().enumerate() {
        let name = tool
            .get("name")
            .ok_or_else(|| ExtractionError::missing(format!("tools[{i}].name")))?
            .as_str()
            .ok_or_else(|| ExtractionError::unexpected(format!("tools[{i}].name"), "a string"))?;
        if let Some(description) = tool.get("description").and_then(Value::as_str) {
            descriptions.insert(name.to_owned(), description.to_owned());
        }
    }
    Ok(descriptions)
}

fn present<'a>(arguments: &'a CallArguments, key: &str) -> Option<&'a Value> {
    arguments.get(key).filter(|v| !v.is_null())
}

fn optional_str<'a>(
    arguments: &'a CallArguments,
    key: &'static str,
) -> Result<Option<&'a str>, ExtractionError> {
    present(arguments, key)
        .map(|v| v.as_str().ok_or_else(|| ExtractionError::unexpected(key, "a string")))
        .transpose()
}
