//! Response extraction for the Anthropic Messages API.
//!
//! When the response contains tool-use blocks, `output` switches from the
//! first block's text to the compact JSON of the first block. Consumers must
//! check [`OutputParameters::has_tool_calls`] rather than parse `output`.

use schema::{ExtractionError, InputParameters, OutputParameters, TokenUsage, ToolCall};
use serde_json::Value;
use tracing::debug;

const TOOL_USE: &str = "tool_use";

/// Like [`extract_output_parameters`], but an unexpected response shape
/// yields [`OutputParameters::default`] instead of an error.
pub fn safe_extract_output_parameters(
    response: &Value,
    input: &InputParameters,
) -> OutputParameters {
    match extract_output_parameters(response, input) {
        Ok(output) => output,
        Err(err) => {
            debug!(error = %err, "Unrecognised Messages response shape; recording empty output");
            OutputParameters::default()
        }
    }
}

/// Extracts the canonical response from a raw Messages response body.
pub fn extract_output_parameters(
    response: &Value,
    input: &InputParameters,
) -> Result<OutputParameters, ExtractionError> {
    let blocks = match response.get("content") {
        Some(Value::Array(blocks)) => blocks,
        Some(_) => return Err(ExtractionError::unexpected("content", "an array")),
        None => return Err(ExtractionError::missing("content")),
    };
    let first = blocks
        .first()
        .ok_or_else(|| ExtractionError::missing("content[0]"))?;

    let tool_blocks: Vec<(usize, &Value)> = blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| block.get("type").and_then(Value::as_str) == Some(TOOL_USE))
        .collect();

    let output = if tool_blocks.is_empty() {
        first
            .get("text")
            .ok_or_else(|| ExtractionError::missing("content[0].text"))?
            .as_str()
            .ok_or_else(|| ExtractionError::unexpected("content[0].text", "a string"))?
            .to_owned()
    } else {
        first.to_string()
    };

    let tools_called = if tool_blocks.is_empty() {
        None
    } else {
        let calls = tool_blocks
            .into_iter()
            .map(|(i, block)| tool_call(i, block, input))
            .collect::<Result<Vec<_>, _>>()?;
        Some(calls)
    };

    Ok(OutputParameters {
        content: Some(first.clone()),
        output: Some(output),
        role: optional_str(response, "role")?,
        kind: optional_str(response, "type")?,
        usage: Some(usage(response)?),
        tools_called,
    })
}

fn tool_call(index: usize, block: &Value, input: &InputParameters) -> Result<ToolCall, ExtractionError> {
    let field = format!("content[{index}].name");
    let name = block
        .get("name")
        .ok_or_else(|| ExtractionError::missing(field.clone()))?
        .as_str()
        .ok_or_else(|| ExtractionError::unexpected(field, "a string"))?;
    Ok(ToolCall {
        name: name.to_owned(),
        input_parameters: block.get("input").cloned().unwrap_or(Value::Null),
        description: input.tool_description(name).map(str::to_owned),
    })
}

fn usage(response: &Value) -> Result<TokenUsage, ExtractionError> {
    let usage = response
        .get("usage")
        .ok_or_else(|| ExtractionError::missing("usage"))?;
    let count = |key: &str| -> Result<u64, ExtractionError> {
        let field = format!("usage.{key}");
        usage
            .get(key)
            .ok_or_else(|| ExtractionError::missing(field.clone()))?
            .as_u64()
            .ok_or_else(|| ExtractionError::unexpected(field, "a non-negative integer"))
    };
    Ok(TokenUsage::new(count("input_tokens")?, count("output_tokens")?))
}

fn optional_str(response: &Value, key: &'static str) -> Result<Option<String>, ExtractionError> {
    match response.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ExtractionError::unexpected(key, "a string")),
    }
}
