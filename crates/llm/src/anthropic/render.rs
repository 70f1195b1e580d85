//! Flattening of Anthropic message content into plain text.

use schema::{ExtractionError, NormalizedMessage};
use serde_json::Value;

/// Flattens a `content` value (a string or an array of content blocks) into
/// a single string. `field` is the dotted path used in error messages.
pub fn stringify_content(content: &Value, field: &str) -> Result<String, ExtractionError> {
    match content {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Array(blocks) => {
            let parts = blocks
                .iter()
                .enumerate()
                .map(|(i, block)| stringify_block(block, &format!("{field}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(parts.join("\n"))
        }
        _ => Err(ExtractionError::unexpected(field, "a string or an array of blocks")),
    }
}

fn stringify_block(block: &Value, field: &str) -> Result<String, ExtractionError> {
    let Value::Object(map) = block else {
        return Err(ExtractionError::unexpected(field, "an object"));
    };
    let kind = map
        .get("type")
        .ok_or_else(|| ExtractionError::missing(format!("{field}.type")))?
        .as_str()
        .ok_or_else(|| ExtractionError::unexpected(format!("{field}.type"), "a string"))?;

    match kind {
        "text" => map
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ExtractionError::missing(format!("{field}.text"))),
        "tool_use" => {
            let name = map.get("name").and_then(Value::as_str).unwrap_or_default();
            let input = map.get("input").unwrap_or(&Value::Null);
            Ok(format!("[tool_use {name}: {input}]"))
        }
        "tool_result" => stringify_content(
            map.get("content").unwrap_or(&Value::Null),
            &format!("{field}.content"),
        ),
        other => Ok(format!("[{other}]")),
    }
}

/// Renders raw Messages-API messages into role + flattened content pairs.
pub fn render_messages(messages: &[Value]) -> Result<Vec<NormalizedMessage>, ExtractionError> {
    messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            let field = format!("messages[{i}]");
            let Value::Object(map) = message else {
                return Err(ExtractionError::unexpected(field, "an object"));
            };
            let role = map
                .get("role")
                .ok_or_else(|| ExtractionError::missing(format!("{field}.role")))?
                .as_str()
                .ok_or_else(|| ExtractionError::unexpected(format!("{field}.role"), "a string"))?;
            let content = stringify_content(
                map.get("content").unwrap_or(&Value::Null),
                &format!("{field}.content"),
            )?;
            Ok(NormalizedMessage::new(role, content))
        })
        .collect()
}
