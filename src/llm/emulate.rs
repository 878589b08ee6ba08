//! Tool calls for models without native support, with corrective re-prompting.

use tracing::{debug, warn};

use super::Llm;
use crate::emulation::{emulate_tool_results, parse_tool_calls, EmulationMode, ParsedToolCalls};
use crate::error::{RelayError, Result};
use crate::io::MessageKind;
use crate::provider::ChatRequest;
use crate::tools::validation::validate_requests;
use crate::tools::{ToolContext, ToolSpecification};
use crate::types::{ChatMessage, NullSafeResponse, StreamingResult};

/// Calls per emulated request, counting corrective retries.
pub const MAX_EMULATION_ATTEMPTS: u32 = 3;

enum Rejection {
    Parse(String),
    Validation(Vec<String>),
}

impl Llm {
    pub(super) async fn emulate_tool_calls(
        &self,
        messages: &[ChatMessage],
        tools: &ToolContext,
    ) -> Result<StreamingResult> {
        let capabilities = self.provider.capabilities();
        let mode = EmulationMode::for_json_schema_support(capabilities.supports_json_schema);

        let mut specifications = tools.specifications.clone();
        if !capabilities.supports_reasoning && !specifications.iter().any(ToolSpecification::is_think) {
            specifications.push(ToolSpecification::think());
        }
        let response_format = mode.response_format(&specifications);
        let mut transcript = mode.prepare_messages(&emulate_tool_results(messages), &specifications);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = ChatRequest::builder()
                .messages(transcript.clone())
                .response_format(response_format.clone())
                .metadata(self.metadata())
                .build();
            let result = self.executor().execute(request, self.echo_options(true)).await?;
            if result.error().is_some() {
                return Ok(result);
            }

            let raw = result.text().to_string();
            let rejection = match self.parse_required(&raw, tools) {
                Ok(parsed) => {
                    let errors = validate_requests(&parsed.tool_requests, &specifications);
                    if errors.is_empty() {
                        self.echo_planned_calls(&parsed.tool_requests);
                        let (response, _) = result.into_parts();
                        let response = NullSafeResponse {
                            text: Some(String::new()),
                            reasoning: parsed.reasoning,
                            tool_requests: parsed.tool_requests,
                            original: response.and_then(|r| r.original),
                        };
                        return Ok(StreamingResult::success(response).with_retry_count(attempt - 1));
                    }
                    Rejection::Validation(errors)
                }
                Err(message) => Rejection::Parse(message),
            };

            let correction = match rejection {
                Rejection::Validation(errors) => {
                    warn!(model = %self.model_id(), attempt, errors = errors.len(), "emulated tool calls failed validation");
                    if attempt >= MAX_EMULATION_ATTEMPTS {
                        return Ok(StreamingResult::failure(RelayError::ToolValidation(errors.join("; ")))
                            .with_retry_count(attempt - 1));
                    }
                    if self.options.echo {
                        self.io.llm_output(
                            &format!("\nTool call validation errors:\n- {}", errors.join("\n- ")),
                            MessageKind::Custom,
                            false,
                        );
                    }
                    mode.retry_instructions(Some(&format!(
                        "Tool call validation failed: {}",
                        errors.join("; ")
                    )))
                }
                Rejection::Parse(message) => {
                    debug!(model = %self.model_id(), attempt, error = %message, "emulated tool calls did not parse");
                    if attempt >= MAX_EMULATION_ATTEMPTS {
                        return Ok(StreamingResult::failure(RelayError::InvalidToolCalls(message))
                            .with_retry_count(attempt - 1));
                    }
                    self.io.llm_output(
                        &format!(
                            "\nRetry {attempt}/{}: invalid JSON response; requesting proper format.",
                            MAX_EMULATION_ATTEMPTS - 1
                        ),
                        MessageKind::Custom,
                        false,
                    );
                    mode.retry_instructions(Some(&message))
                }
            };

            transcript.push(ChatMessage::assistant(raw));
            transcript.push(ChatMessage::user(correction));
        }
    }

    /// Parse, and insist on at least one real call when the caller requires one.
    fn parse_required(&self, raw: &str, tools: &ToolContext) -> std::result::Result<ParsedToolCalls, String> {
        let parsed = parse_tool_calls(raw, &self.ids).map_err(|e| match e {
            RelayError::InvalidToolCalls(message) => message,
            other => other.to_string(),
        })?;
        if tools.requires_tool_call() && parsed.tool_requests.is_empty() {
            return Err("No 'tool_calls' found in JSON".to_string());
        }
        Ok(parsed)
    }
}
