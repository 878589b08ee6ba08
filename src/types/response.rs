//! Completed responses and the outcome of one streaming call.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::message::AssistantMessage;
use super::usage::Usage;
use crate::error::RelayError;
use crate::tools::ToolExecutionRequest;

/// Substituted for blank text when a reply carries tool calls. Some providers
/// reject assistant history with empty content.
pub const TOOL_CALLS_FILLER: &str = "Tool calls";

/// A response as the provider completed it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: AssistantMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Normalized view over a response whose fields may be absent.
///
/// `original` is `None` for responses assembled locally: partial text captured
/// before an error, or tool calls parsed out of emulated JSON.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NullSafeResponse {
    pub text: Option<String>,
    pub reasoning: Option<String>,
    pub tool_requests: Vec<ToolExecutionRequest>,
    pub original: Option<ChatResponse>,
}

impl NullSafeResponse {
    pub fn from_response(response: ChatResponse) -> Self {
        Self {
            text: response.message.text.clone(),
            reasoning: response.message.reasoning.clone(),
            tool_requests: response.message.tool_requests.clone(),
            original: Some(response),
        }
    }

    /// Synthetic response built from streamed fragments.
    pub fn partial(text: String, reasoning: String) -> Self {
        Self {
            text: Some(text),
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            tool_requests: Vec::new(),
            original: None,
        }
    }

    /// No text and no tool calls.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty) && self.tool_requests.is_empty()
    }

    /// The reply as history, never with blank text next to tool calls.
    pub fn assistant_message(&self) -> AssistantMessage {
        let mut text = self.text.clone().unwrap_or_default();
        if text.trim().is_empty() && !self.tool_requests.is_empty() {
            text = TOOL_CALLS_FILLER.to_string();
        }
        AssistantMessage {
            text: Some(text),
            reasoning: self.reasoning.clone(),
            tool_requests: self.tool_requests.clone(),
        }
    }
}

/// Outcome of one call: a response, an error, or an error with the partial
/// response captured before it.
///
/// If there is no error a response is present. If both are present the
/// response is synthetic (`original` is `None`).
#[derive(Debug)]
pub struct StreamingResult {
    response: Option<NullSafeResponse>,
    error: Option<RelayError>,
    retries: u32,
}

impl StreamingResult {
    pub fn success(response: NullSafeResponse) -> Self {
        Self {
            response: Some(response),
            error: None,
            retries: 0,
        }
    }

    pub fn from_response(response: ChatResponse) -> Self {
        Self::success(NullSafeResponse::from_response(response))
    }

    pub fn failure(error: RelayError) -> Self {
        Self {
            response: None,
            error: Some(error),
            retries: 0,
        }
    }

    /// An error accompanied by a synthetic response.
    pub fn partial(response: NullSafeResponse, error: RelayError) -> Self {
        debug_assert!(
            response.original.is_none(),
            "a partial response must not carry a completed provider response"
        );
        Self {
            response: Some(NullSafeResponse {
                original: None,
                ..response
            }),
            error: Some(error),
            retries: 0,
        }
    }

    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn response(&self) -> Option<&NullSafeResponse> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&RelayError> {
        self.error.as_ref()
    }

    pub fn into_parts(self) -> (Option<NullSafeResponse>, Option<RelayError>) {
        (self.response, self.error)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn text(&self) -> &str {
        self.response
            .as_ref()
            .and_then(|r| r.text.as_deref())
            .unwrap_or_default()
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.response.as_ref().and_then(|r| r.reasoning.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.response.as_ref().map_or(true, NullSafeResponse::is_empty)
    }

    pub fn original(&self) -> Option<&ChatResponse> {
        self.response.as_ref().and_then(|r| r.original.as_ref())
    }

    /// Truncated by the provider, or cut short by an error.
    pub fn is_partial(&self) -> bool {
        if self.error.is_some() {
            return self.response.is_some();
        }
        self.original()
            .is_some_and(|o| o.finish_reason == Some(FinishReason::Length))
    }

    pub fn tool_requests(&self) -> &[ToolExecutionRequest] {
        self.response
            .as_ref()
            .map(|r| r.tool_requests.as_slice())
            .unwrap_or_default()
    }

    pub fn usage(&self) -> Option<Usage> {
        self.original().and_then(|o| o.usage)
    }

    pub fn assistant_message(&self) -> Option<AssistantMessage> {
        self.response.as_ref().map(NullSafeResponse::assistant_message)
    }

    /// Multi-line rendering for the history log.
    pub fn formatted(&self) -> String {
        if let Some(error) = &self.error {
            let content = if self.text().is_empty() {
                "[No response content available]".to_string()
            } else {
                format!("[Partial response text]\n{}", self.text())
            };
            return format!("[Error: {error}]\n{content}\n");
        }
        match self.original() {
            Some(original) => {
                serde_json::to_string_pretty(original).unwrap_or_else(|_| format!("{original:#?}"))
            }
            None => format!("{:#?}", self.response),
        }
    }

    /// One-line description: the error, the called tool names, or the text.
    pub fn description(&self) -> String {
        if let Some(error) = &self.error {
            return error.to_string();
        }
        let tools = self.tool_requests();
        if !tools.is_empty() {
            return tools
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
        }
        let text = self.text();
        if text.trim().is_empty() {
            return "[empty response]".to_string();
        }
        text.to_string()
    }
}
