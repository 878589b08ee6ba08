//! Conversation messages.

use serde::{Deserialize, Serialize};

use crate::tools::ToolExecutionRequest;

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System {
        text: String,
    },
    User {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        text: String,
    },
    Assistant(AssistantMessage),
    ToolResult(ToolResultMessage),
}

/// Reply from the model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_requests: Vec<ToolExecutionRequest>,
}

/// Output of one executed tool, correlated to its request by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub id: String,
    pub tool_name: String,
    pub text: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            name: None,
            text: text.into(),
        }
    }

    /// Plain-text assistant reply.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant(AssistantMessage::text(text))
    }

    pub fn tool_result(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::ToolResult(ToolResultMessage {
            id: id.into(),
            tool_name: tool_name.into(),
            text: text.into(),
        })
    }

    /// The message's primary text; empty for a text-less assistant reply.
    pub fn text(&self) -> &str {
        match self {
            Self::System { text } | Self::User { text, .. } => text,
            Self::Assistant(ai) => ai.text.as_deref().unwrap_or_default(),
            Self::ToolResult(result) => &result.text,
        }
    }

    /// Text rendering that keeps tool requests visible without their structure.
    pub fn repr(&self) -> String {
        match self {
            Self::Assistant(ai) => ai.repr(),
            other => other.text().to_string(),
        }
    }

    /// Short kind label for log summaries, e.g. `TER(search:3)`.
    pub fn kind_label(&self) -> String {
        match self {
            Self::System { .. } => "System".to_string(),
            Self::User { .. } => "User".to_string(),
            Self::Assistant(ai) if ai.has_tool_requests() => "AI(toolCalls)".to_string(),
            Self::Assistant(_) => "AI".to_string(),
            Self::ToolResult(r) => format!("TER({}:{})", r.tool_name, r.id),
        }
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult(_))
    }

    /// An assistant message exposing structured tool requests.
    pub fn has_tool_requests(&self) -> bool {
        matches!(self, Self::Assistant(ai) if ai.has_tool_requests())
    }

    /// Append text to a user message, or return `None` for any other role.
    pub fn with_appended_text(&self, suffix: &str) -> Option<Self> {
        match self {
            Self::User { name, text } => Some(Self::User {
                name: name.clone(),
                text: format!("{text}{suffix}"),
            }),
            _ => None,
        }
    }
}

impl AssistantMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn has_tool_requests(&self) -> bool {
        !self.tool_requests.is_empty()
    }

    /// A reply is well-formed if it has non-blank text or at least one tool request.
    pub fn is_well_formed(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty()) || self.has_tool_requests()
    }

    /// Text followed by one line per tool request. Reasoning is dropped.
    pub fn repr(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        if let Some(text) = self.text.as_deref().filter(|t| !t.trim().is_empty()) {
            lines.push(text.to_string());
        }
        lines.extend(
            self.tool_requests
                .iter()
                .map(|r| format!("Tool call: {}", r.render())),
        );
        lines.join("\n")
    }
}

/// Render a message list as `System -> User -> AI(toolCalls) -> TER(search:0)`.
pub fn summarize(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(ChatMessage::kind_label)
        .collect::<Vec<_>>()
        .join(" -> ")
}
