//! Text and schema that tell a model how to express tool calls as JSON.

use crate::tools::ToolSpecification;
use crate::types::{ChatMessage, ResponseFormat};

/// Name of the JSON schema sent in schema mode.
pub const TOOL_CALLS_SCHEMA_NAME: &str = "ToolCalls";

/// How tool calls are requested from a model without native support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulationMode {
    /// The provider enforces a JSON schema on the output.
    JsonSchema,
    /// The provider only guarantees a JSON object; the contract is in the prompt.
    JsonObject,
}

impl EmulationMode {
    pub fn for_json_schema_support(supports_json_schema: bool) -> Self {
        if supports_json_schema {
            Self::JsonSchema
        } else {
            Self::JsonObject
        }
    }

    pub fn response_format(&self, tools: &[ToolSpecification]) -> ResponseFormat {
        match self {
            Self::JsonSchema => ResponseFormat::JsonSchema {
                name: TOOL_CALLS_SCHEMA_NAME.to_string(),
                schema: tool_calls_schema(tools),
            },
            Self::JsonObject => ResponseFormat::JsonObject,
        }
    }

    /// Format reminder, prefixed with the previous error when retrying.
    pub fn retry_instructions(&self, error: Option<&str>) -> String {
        match self {
            Self::JsonSchema => {
                let prefix = error
                    .map(|e| format!("Your previous response was invalid or did not contain tool_calls: {e}"))
                    .unwrap_or_default();
                format!(
                    "{prefix}
Please ensure you only return a JSON object matching the schema:
  {{
    \"tool_calls\": [
      {{
        \"name\": \"...\",
        \"arguments\": {{ ... }}
      }},
      {{
        \"name\": \"...\",
        \"arguments\": {{ ... }}
      }}
    ]
  }}
"
                )
            }
            Self::JsonObject => {
                let prefix = error
                    .map(|e| format!("Your previous response was not valid: {e}"))
                    .unwrap_or_default();
                format!(
                    "{prefix}
Respond with a single JSON object containing a `tool_calls` array. Each entry in the array represents one invocation of a tool.
No additional keys or text are allowed outside of that JSON object.
Each tool call must have a `name` that matches one of the available tools, and an `arguments` object containing valid parameters as required by that tool.

Here is the format visualized, where $foo indicates that you will make appropriate substitutions for the given tool call
{{
  \"tool_calls\": [
    {{
      \"name\": \"$tool_name1\",
      \"arguments\": {{
        \"$arg1\": \"$value1\",
        \"$arg2\": \"$value2\",
        ...
      }}
    }},
    {{
      \"name\": \"$tool_name2\",
      \"arguments\": {{
        \"$arg3\": \"$value3\",
        \"$arg4\": \"$value4\",
        ...
      }}
    }}
  ]
}}
"
                )
            }
        }
    }

    /// Append the tool catalogue to the last message, unless (in object mode)
    /// the history already carries it.
    pub fn prepare_messages(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpecification],
    ) -> Vec<ChatMessage> {
        let mut prepared = messages.to_vec();
        if *self == Self::JsonObject && instructions_present(messages) {
            return prepared;
        }
        let Some(last) = prepared.last_mut() else {
            return prepared;
        };
        let suffix = format!(
            "\n\n{}",
            catalogue_instructions(tools, &self.retry_instructions(None))
        );
        *last = last
            .with_appended_text(&suffix)
            .unwrap_or_else(|| ChatMessage::user(format!("{}{suffix}", last.text())));
        prepared
    }
}

/// The full instruction block: tool catalogue, format contract, closing reminder.
pub fn catalogue_instructions(tools: &[ToolSpecification], format_contract: &str) -> String {
    let catalogue = tools
        .iter()
        .map(describe_tool)
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{} available tools:\n{catalogue}\n\n{format_contract}\n\n\
         Include all the tool calls necessary to satisfy the request in a single object!\n",
        tools.len()
    )
}

/// Whether any message already carries the tool instructions.
pub fn instructions_present(messages: &[ChatMessage]) -> bool {
    messages.iter().any(|m| {
        let text = m.text();
        text.contains("available tools:") && text.contains("tool_calls")
    })
}

fn describe_tool(tool: &ToolSpecification) -> String {
    let parameters = tool
        .parameters
        .iter()
        .map(|p| {
            format!(
                "<parameter name=\"{}\" type=\"{}\" required=\"{}\">\n{}\n</parameter>\n",
                p.name,
                p.kind.describe(),
                p.required,
                p.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let parameters = if parameters.is_empty() {
        "(No parameters)".to_string()
    } else {
        parameters
    };
    format!(
        "<tool name=\"{}\">\n{}\n{parameters}\n</tool>\n",
        tool.name, tool.description
    )
}

/// `{"tool_calls": [{"name": <one of tools>, "arguments": {...}}]}`.
///
/// Arguments stay a free-form object; per-tool `anyOf` branches are not
/// reliably supported by providers.
pub fn tool_calls_schema(tools: &[ToolSpecification]) -> serde_json::Value {
    let mut names: Vec<&str> = Vec::new();
    for tool in tools {
        if !names.contains(&tool.name.as_str()) {
            names.push(&tool.name);
        }
    }
    serde_json::json!({
        "type": "object",
        "description": "Top-level object containing a 'tool_calls' array describing calls to be made.",
        "properties": {
            "tool_calls": {
                "type": "array",
                "description": "All tool calls to be made in sequence.",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "enum": names,
                            "description": format!("Name of the tool to call; must be one of: {}", names.join(", ")),
                        },
                        "arguments": {
                            "type": "object",
                            "description": "Tool arguments object (specific structure depends on the tool).",
                        },
                    },
                    "required": ["name", "arguments"],
                },
            },
        },
        "required": ["tool_calls"],
    })
}
