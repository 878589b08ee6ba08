//! Attempt loop with backoff, and the required-tool-call enforcement around it.

use tracing::{debug, warn};

use super::{Llm, TOOL_REQUIRED_REMINDER};
use crate::error::{RelayError, Result};
use crate::history::short_description;
use crate::io::NotificationRole;
use crate::tools::ToolContext;
use crate::types::{ChatMessage, StreamingResult};

impl Llm {
    pub(super) async fn send_enforcing_tool_choice(
        &self,
        messages: Vec<ChatMessage>,
        tools: &ToolContext,
    ) -> Result<StreamingResult> {
        let max_attempts = self.retry.max_attempts;
        let mut result = self.send_with_retry(&messages, tools, max_attempts).await?;
        let mut used = result.retries() + 1;
        if tools.is_empty() || !tools.requires_tool_call() {
            return Ok(result);
        }

        let mut transcript = messages;
        while missing_tool_calls(&result) && used < max_attempts {
            self.io
                .notify(NotificationRole::Info, "Enforcing tool selection");
            debug!(model = %self.model_id(), used, max_attempts, "reply had no tool calls");
            if let Some(reply) = result.assistant_message() {
                transcript.push(ChatMessage::Assistant(reply));
            }
            transcript.push(ChatMessage::user(TOOL_REQUIRED_REMINDER));
            result = self
                .send_with_retry(&transcript, tools, max_attempts - used)
                .await?;
            used += result.retries() + 1;
        }

        if missing_tool_calls(&result) {
            warn!(model = %self.model_id(), attempts = used, "required tool call never arrived");
            return Ok(
                StreamingResult::failure(RelayError::MissingToolCalls { attempts: used })
                    .with_retry_count(used.saturating_sub(1)),
            );
        }
        Ok(result)
    }

    /// Up to `max_attempts` attempts; the first acceptable result wins.
    pub(super) async fn send_with_retry(
        &self,
        messages: &[ChatMessage],
        tools: &ToolContext,
        max_attempts: u32,
    ) -> Result<StreamingResult> {
        let max_attempts = max_attempts.max(1);
        let description = messages
            .last()
            .map(|m| short_description(m.text()))
            .unwrap_or_default();

        let mut last_error = None;
        let mut attempt = 0;
        while attempt < max_attempts {
            attempt += 1;
            debug!(model = %self.model_id(), attempt, max_attempts, request = %description, "sending request");

            let result = self.send_once(messages, tools).await?;
            if self.is_acceptable(&result) {
                return Ok(result.with_retry_count(attempt - 1));
            }

            let (_, error) = result.into_parts();
            let error = error.unwrap_or(RelayError::EmptyResponse);
            let fatal = error.is_non_retriable();
            debug!(model = %self.model_id(), attempt, fatal, error = %error, "attempt failed");
            last_error = Some(error);
            if fatal || attempt == max_attempts {
                break;
            }
            self.retry
                .wait_backoff(attempt, max_attempts, self.io.as_ref(), &self.cancel)
                .await?;
        }

        let error = last_error.unwrap_or(RelayError::EmptyResponse);
        Ok(StreamingResult::failure(error).with_retry_count(attempt.saturating_sub(1)))
    }

    /// Non-empty and error-free, or a partial response when those are allowed.
    /// An empty error-free reply is accepted only when partials are allowed.
    fn is_acceptable(&self, result: &StreamingResult) -> bool {
        let allow_partial = self.options.allow_partial_responses;
        match (result.is_empty(), result.error()) {
            (false, None) => true,
            (false, Some(_)) => allow_partial,
            (true, None) => allow_partial && result.response().is_some(),
            (true, Some(_)) => false,
        }
    }
}

fn missing_tool_calls(result: &StreamingResult) -> bool {
    result.error().is_none() && result.tool_requests().is_empty()
}
