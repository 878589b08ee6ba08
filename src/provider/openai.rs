//! OpenAI-compatible Chat Completions provider (streaming only).
//!
//! Works against OpenAI itself and against proxies and local servers that
//! speak the same wire format (LiteLLM, vLLM, LM Studio, ...).

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::models::ModelCapabilities;
use crate::tools::ToolExecutionRequest;
use crate::types::{
    AssistantMessage, ChatMessage, ChatResponse, FinishReason, ResponseFormat, ToolChoice, Usage,
};

use super::http::{
    bearer_headers, is_sse_done, parse_sse_data, shared_client, status_to_error, stream_error,
    take_sse_line,
};
use super::{ChatRequest, ChatStream, ModelProvider, StreamEvent};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiCompatibleProvider {
    model_id: String,
    api_key: Option<String>,
    base_url: String,
    capabilities: ModelCapabilities,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        model_id: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
        capabilities: ModelCapabilities,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            capabilities,
        }
    }

    /// Build from configuration. The public endpoint requires an API key;
    /// a custom base URL may not.
    pub fn from_config(
        config: &RelayConfig,
        model_id: impl Into<String>,
        capabilities: ModelCapabilities,
    ) -> Result<Self> {
        if config.api_key.is_none() && config.base_url.is_none() {
            return Err(RelayError::Configuration(
                "Missing RELAY_API_KEY (or OPENAI_API_KEY)".into(),
            ));
        }
        Ok(Self::new(
            model_id,
            config.api_key.clone(),
            config.base_url.clone(),
            capabilities,
        ))
    }

    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request.messages.iter().map(message_to_openai).collect();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), self.model_id.clone().into());
        body.insert("messages".into(), messages.into());
        body.insert("stream".into(), true.into());
        body.insert("stream_options".into(), serde_json::json!({ "include_usage": true }));

        if !request.tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters_schema(),
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), tool_defs.into());
        }
        if let Some(choice) = request.tool_choice {
            let value = match choice {
                ToolChoice::Auto => "auto",
                ToolChoice::Required => "required",
            };
            body.insert("tool_choice".into(), value.into());
        }
        if let Some(parallel) = request.parallel_tool_calls {
            body.insert("parallel_tool_calls".into(), parallel.into());
        }

        match &request.response_format {
            Some(ResponseFormat::JsonObject) => {
                body.insert("response_format".into(), serde_json::json!({ "type": "json_object" }));
            }
            Some(ResponseFormat::JsonSchema { name, schema }) => {
                body.insert(
                    "response_format".into(),
                    serde_json::json!({
                        "type": "json_schema",
                        "json_schema": { "name": name, "schema": schema },
                    }),
                );
            }
            Some(ResponseFormat::Text) | None => {}
        }

        if !request.metadata.is_empty() {
            body.insert("metadata".into(), serde_json::json!(request.metadata));
        }

        serde_json::Value::Object(body)
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    fn provider_name(&self) -> &str {
        "openai-compatible"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model_id, messages = request.messages.len(), "OpenAI-compatible stream_chat");
        trace!(%body, "request body");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(self.api_key.as_deref()))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();
        let fallback_model = self.model_id.clone();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut acc = ResponseAccumulator::default();
            let mut finished = false;
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(RelayError::Network(e));
                        return;
                    }
                };

                buffer.extend_from_slice(&chunk);

                while let Some(line) = take_sse_line(&mut buffer) {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            debug!(error = %e, "skipping stream line that is not valid UTF-8");
                            continue;
                        }
                    };

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    if is_sse_done(&line) {
                        finished = true;
                        break 'read;
                    }
                    let Some(data) = parse_sse_data(&line) else {
                        continue;
                    };
                    let value: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(e) => {
                            debug!(error = %e, "skipping unparseable stream chunk");
                            continue;
                        }
                    };
                    if let Some(error) = value.get("error") {
                        yield Err(stream_error(error));
                        return;
                    }
                    let chunk: StreamChunk = match serde_json::from_value(value) {
                        Ok(c) => c,
                        Err(e) => {
                            debug!(error = %e, "skipping stream chunk with unexpected shape");
                            continue;
                        }
                    };
                    for event in acc.apply(chunk) {
                        yield Ok(event);
                    }
                }
            }

            if finished || acc.finish_reason.is_some() {
                yield Ok(StreamEvent::Complete(Some(acc.into_response(fallback_model))));
            } else {
                yield Err(RelayError::Stream("connection closed before the response completed".into()));
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Collects deltas into the completed response.
#[derive(Default)]
struct ResponseAccumulator {
    text: String,
    reasoning: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ResponseAccumulator {
    fn apply(&mut self, chunk: StreamChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if chunk.model.is_some() {
            self.model = chunk.model;
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }
        for choice in chunk.choices {
            if let Some(reasoning) = choice.delta.reasoning_content.filter(|r| !r.is_empty()) {
                self.reasoning.push_str(&reasoning);
                events.push(StreamEvent::ReasoningDelta(reasoning));
            }
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                self.text.push_str(&text);
                events.push(StreamEvent::TextDelta(text));
            }
            for call in choice.delta.tool_calls {
                let entry = self.tool_calls.entry(call.index).or_default();
                if let Some(id) = call.id {
                    entry.id = Some(id);
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(args) = function.arguments {
                        entry.arguments.push_str(&args);
                    }
                }
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(FinishReason::from_provider(&reason));
            }
        }
        events
    }

    fn into_response(self, fallback_model: String) -> ChatResponse {
        let tool_requests = self
            .tool_calls
            .into_iter()
            .map(|(index, call)| {
                ToolExecutionRequest::new(
                    call.id.unwrap_or_else(|| format!("call_{index}")),
                    call.name,
                    call.arguments,
                )
            })
            .collect();
        ChatResponse {
            message: AssistantMessage {
                text: (!self.text.is_empty()).then_some(self.text),
                reasoning: (!self.reasoning.is_empty()).then_some(self.reasoning),
                tool_requests,
            },
            usage: self.usage,
            finish_reason: self.finish_reason,
            model: Some(self.model.unwrap_or(fallback_model)),
        }
    }
}

fn message_to_openai(msg: &ChatMessage) -> serde_json::Value {
    match msg {
        ChatMessage::System { text } => serde_json::json!({ "role": "system", "content": text }),
        ChatMessage::User { name, text } => {
            let mut value = serde_json::json!({ "role": "user", "content": text });
            if let (Some(name), Some(obj)) = (name, value.as_object_mut()) {
                obj.insert("name".into(), name.clone().into());
            }
            value
        }
        ChatMessage::Assistant(ai) => {
            let content = match ai.text.as_deref() {
                Some(t) if !t.is_empty() => serde_json::Value::String(t.to_string()),
                _ => serde_json::Value::Null,
            };
            if ai.tool_requests.is_empty() {
                return serde_json::json!({ "role": "assistant", "content": content });
            }
            let tc_json: Vec<serde_json::Value> = ai
                .tool_requests
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": { "name": tc.name, "arguments": tc.arguments },
                    })
                })
                .collect();
            serde_json::json!({ "role": "assistant", "content": content, "tool_calls": tc_json })
        }
        ChatMessage::ToolResult(result) => serde_json::json!({
            "role": "tool",
            "tool_call_id": result.id,
            "content": result.text,
        }),
    }
}

// OpenAI API stream types (internal)

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<ApiUsage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    #[serde(alias = "reasoning")]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    prompt_tokens_details: Option<PromptDetails>,
    completion_tokens_details: Option<CompletionDetails>,
}

#[derive(Deserialize)]
struct PromptDetails {
    cached_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct CompletionDetails {
    reasoning_tokens: Option<u32>,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            cached_input_tokens: u
                .prompt_tokens_details
                .and_then(|d| d.cached_tokens)
                .unwrap_or_default(),
            reasoning_tokens: u
                .completion_tokens_details
                .and_then(|d| d.reasoning_tokens)
                .unwrap_or_default(),
            output_tokens: u.completion_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolSpecification;

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new("gpt-test", Some("k".into()), None, ModelCapabilities::full(128_000))
    }

    #[test]
    fn request_body_carries_native_tool_fields() {
        let request = ChatRequest::builder()
            .messages(vec![ChatMessage::user("find main")])
            .tools(vec![ToolSpecification::builder("search", "Search")
                .string("pattern", "Regex", true)
                .build()])
            .tool_choice(ToolChoice::Required)
            .parallel_tool_calls(true)
            .metadata(BTreeMap::from([("tags".to_string(), "retain".to_string())]))
            .build();

        let body = provider().build_request_body(&request);

        assert_eq!(body["tools"][0]["function"]["name"], "search");
        assert_eq!(body["tools"][0]["function"]["parameters"]["required"][0], "pattern");
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["parallel_tool_calls"], true);
        assert_eq!(body["metadata"]["tags"], "retain");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn request_body_omits_absent_options() {
        let request = ChatRequest::builder()
            .messages(vec![ChatMessage::user("hi")])
            .response_format(ResponseFormat::JsonObject)
            .build();

        let body = provider().build_request_body(&request);

        assert_eq!(body["response_format"]["type"], "json_object");
        for key in ["tools", "tool_choice", "parallel_tool_calls", "metadata"] {
            assert!(body.get(key).is_none(), "{key} should be omitted");
        }
    }

    #[test]
    fn tool_results_and_calls_use_wire_shape() {
        let assistant = ChatMessage::Assistant(AssistantMessage {
            text: None,
            reasoning: Some("hidden".into()),
            tool_requests: vec![ToolExecutionRequest::new("call_1", "search", "{}")],
        });
        let value = message_to_openai(&assistant);
        assert!(value["content"].is_null());
        assert_eq!(value["tool_calls"][0]["function"]["name"], "search");
        assert!(value.get("reasoning").is_none());

        let result = message_to_openai(&ChatMessage::tool_result("call_1", "search", "none"));
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "call_1");
    }

    #[test]
    fn accumulator_assembles_split_tool_calls() {
        let mut acc = ResponseAccumulator::default();
        let first: StreamChunk = serde_json::from_value(serde_json::json!({
            "choices": [{ "delta": { "tool_calls": [
                { "index": 0, "id": "call_a", "function": { "name": "search", "arguments": "{\"pat" } }
            ]}}]
        }))
        .unwrap();
        let second: StreamChunk = serde_json::from_value(serde_json::json!({
            "choices": [{ "delta": { "tool_calls": [
                { "index": 0, "function": { "arguments": "tern\":\"x\"}" } }
            ]}, "finish_reason": "tool_calls" }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 4 }
        }))
        .unwrap();

        assert!(acc.apply(first).is_empty());
        assert!(acc.apply(second).is_empty());
        let response = acc.into_response("gpt-test".into());

        assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(response.message.tool_requests[0].arguments, r#"{"pattern":"x"}"#);
        assert_eq!(response.usage.map(|u| u.input_tokens), Some(12));
        assert_eq!(response.model.as_deref(), Some("gpt-test"));
    }
}
