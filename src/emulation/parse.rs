//! Parse emulated tool calls out of a model's JSON reply.

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{RelayError, Result};
use crate::tools::{ToolExecutionRequest, ToolRequestIds, THINK_TOOL_NAME};

/// Tool calls recovered from a reply, with `think` calls merged into reasoning.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedToolCalls {
    pub tool_requests: Vec<ToolExecutionRequest>,
    pub reasoning: Option<String>,
}

/// Parse `{"tool_calls": [...]}` (or a bare array) from `raw`.
///
/// When the whole text is not JSON, the span from the first `{` to the last
/// `}` is tried instead. Every call needs a `name` and object `arguments`.
/// Ids are drawn from `ids` for non-think calls only.
pub fn parse_tool_calls(raw: &str, ids: &ToolRequestIds) -> Result<ParsedToolCalls> {
    trace!(raw, "parsing emulated tool calls");
    let root = parse_json(raw)?;

    let calls = match root.get("tool_calls") {
        Some(Value::Array(calls)) => calls,
        _ => match &root {
            Value::Array(calls) => calls,
            _ => return Err(invalid("Response does not contain a 'tool_calls' array")),
        },
    };

    let mut tool_requests = Vec::new();
    let mut thoughts = Vec::new();
    for (i, call) in calls.iter().enumerate() {
        let (Some(name), Some(arguments)) = (
            call.get("name").and_then(Value::as_str),
            call.get("arguments"),
        ) else {
            return Err(invalid(format!(
                "Tool call object is missing 'name' or 'arguments' field at index {i}"
            )));
        };
        if !arguments.is_object() {
            return Err(invalid(format!(
                "tool_calls[{i}] provided non-object arguments {arguments}"
            )));
        }

        if name == THINK_TOOL_NAME {
            let Some(reasoning) = arguments.get("reasoning").and_then(Value::as_str) else {
                return Err(invalid(format!(
                    "Found 'think' tool call without a textual 'reasoning' argument at index {i}"
                )));
            };
            thoughts.push(reasoning.to_string());
            continue;
        }

        tool_requests.push(ToolExecutionRequest::new(
            ids.next_id(),
            name,
            arguments.to_string(),
        ));
    }

    Ok(ParsedToolCalls {
        tool_requests,
        reasoning: (!thoughts.is_empty()).then(|| thoughts.join("\n\n")),
    })
}

fn parse_json(raw: &str) -> Result<Value> {
    let direct_error = match serde_json::from_str::<Value>(raw) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let (Some(first), Some(last)) = (raw.find('{'), raw.rfind('}')) else {
        debug!(error = %direct_error, "no braces in emulated tool response");
        return Err(invalid(format!("Invalid JSON response: {direct_error}")));
    };
    if last < first {
        return Err(invalid(format!("Invalid JSON response: {direct_error}")));
    }

    serde_json::from_str(&raw[first..=last]).map_err(|e| {
        debug!(error = %e, "invalid JSON between braces in emulated tool response");
        invalid(format!("Invalid JSON in response: {e}"))
    })
}

fn invalid(message: impl Into<String>) -> RelayError {
    RelayError::InvalidToolCalls(message.into())
}
