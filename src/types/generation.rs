//! Request-shaping enums: response format, tool choice, finish reason.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Response format directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Any syntactically valid JSON object.
    JsonObject,
    /// JSON constrained by a named schema.
    JsonSchema {
        name: String,
        schema: serde_json::Value,
    },
}

/// Whether the model must call a tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    Required,
}

/// Why the model stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

impl FinishReason {
    /// Map a provider's `finish_reason` string.
    pub fn from_provider(value: &str) -> Self {
        match value {
            "stop" | "end_turn" => Self::Stop,
            "length" | "max_tokens" => Self::Length,
            "tool_calls" | "function_call" | "tool_use" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other,
        }
    }
}
