//! Shared test helpers: a scripted provider and a recording console.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use relay::config::LlmOptions;
use relay::error::{RelayError, Result};
use relay::io::{ConsoleIo, MessageKind, NotificationRole};
use relay::llm::Llm;
use relay::models::ModelCapabilities;
use relay::provider::{ChatRequest, ChatStream, ModelProvider, StreamEvent};
use relay::tools::{ToolExecutionRequest, ToolRequestIds};
use relay::types::{AssistantMessage, ChatResponse, FinishReason, Usage};
use relay::util::retry::RetryPolicy;

/// What the provider does for one call.
pub enum Step {
    /// Stream the chunks as text, then complete with their concatenation.
    Text(Vec<String>),
    /// Stream the reasoning then the text, then complete.
    Reasoned { reasoning: String, text: String },
    /// Complete with native tool calls and no text.
    ToolCalls(Vec<ToolExecutionRequest>),
    /// Reject the request before streaming.
    Reject(RelayError),
    /// Stream the chunks, then fail.
    FailAfter(Vec<String>, RelayError),
    /// Stream the chunks, then go silent forever.
    HangAfter(Vec<String>),
    /// Stream the chunks with a pause before each one, then complete.
    Slow(Vec<String>, Duration),
}

impl Step {
    pub fn text(text: &str) -> Self {
        Self::Text(vec![text.to_string()])
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Self::Text(chunks.iter().map(|c| c.to_string()).collect())
    }

    pub fn hang() -> Self {
        Self::HangAfter(Vec::new())
    }
}

/// A provider that plays back a script, one step per call, and records every
/// request it receives.
pub struct MockProvider {
    model_id: String,
    capabilities: ModelCapabilities,
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    pub fn new(capabilities: ModelCapabilities) -> Self {
        Self {
            model_id: "mock-model".to_string(),
            capabilities,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model with native tool support.
    pub fn native() -> Self {
        Self::new(ModelCapabilities::full(128_000))
    }

    /// A model without native tools; emulation uses a JSON schema.
    pub fn emulated() -> Self {
        Self::new(ModelCapabilities::default().with_json_schema(true))
    }

    pub fn then(self, step: Step) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn completed(text: String, reasoning: String, tool_requests: Vec<ToolExecutionRequest>) -> StreamEvent {
    let finish_reason = if tool_requests.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolCalls
    };
    StreamEvent::Complete(Some(ChatResponse {
        message: AssistantMessage {
            text: (!text.is_empty()).then_some(text),
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            tool_requests,
        },
        usage: Some(Usage {
            input_tokens: 10,
            output_tokens: 20,
            ..Default::default()
        }),
        finish_reason: Some(finish_reason),
        model: Some("mock-model".to_string()),
    }))
}

fn deltas(chunks: &[String]) -> Vec<Result<StreamEvent>> {
    chunks
        .iter()
        .map(|c| Ok(StreamEvent::TextDelta(c.clone())))
        .collect()
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::text("Mock response"));

        let stream: ChatStream = match step {
            Step::Text(chunks) => {
                let mut events = deltas(&chunks);
                events.push(Ok(completed(chunks.concat(), String::new(), Vec::new())));
                futures::stream::iter(events).boxed()
            }
            Step::Reasoned { reasoning, text } => {
                let events = vec![
                    Ok(StreamEvent::ReasoningDelta(reasoning.clone())),
                    Ok(StreamEvent::TextDelta(text.clone())),
                    Ok(completed(text, reasoning, Vec::new())),
                ];
                futures::stream::iter(events).boxed()
            }
            Step::ToolCalls(calls) => {
                futures::stream::iter(vec![Ok(completed(String::new(), String::new(), calls))]).boxed()
            }
            Step::Reject(error) => return Err(error),
            Step::FailAfter(chunks, error) => {
                let mut events = deltas(&chunks);
                events.push(Err(error));
                futures::stream::iter(events).boxed()
            }
            Step::HangAfter(chunks) => futures::stream::iter(deltas(&chunks))
                .chain(futures::stream::pending())
                .boxed(),
            Step::Slow(chunks, gap) => async_stream::stream! {
                for chunk in &chunks {
                    tokio::time::sleep(gap).await;
                    yield Ok(StreamEvent::TextDelta(chunk.clone()));
                }
                yield Ok(completed(chunks.concat(), String::new(), Vec::new()));
            }
            .boxed(),
        };
        Ok(stream)
    }
}

/// One echoed chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub text: String,
    pub kind: MessageKind,
    pub reasoning: bool,
}

/// Records everything written to it.
#[derive(Default)]
pub struct RecordingConsole {
    outputs: Mutex<Vec<Output>>,
    notifications: Mutex<Vec<(NotificationRole, String)>>,
}

impl RecordingConsole {
    pub fn outputs(&self) -> Vec<Output> {
        self.outputs.lock().unwrap().clone()
    }

    /// All echoed text, concatenated.
    pub fn transcript(&self) -> String {
        self.outputs().into_iter().map(|o| o.text).collect()
    }

    pub fn notifications(&self) -> Vec<(NotificationRole, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn notified(&self, needle: &str) -> bool {
        self.notifications().iter().any(|(_, m)| m.contains(needle))
    }
}

impl ConsoleIo for RecordingConsole {
    fn llm_output(&self, text: &str, kind: MessageKind, reasoning: bool) {
        self.outputs.lock().unwrap().push(Output {
            text: text.to_string(),
            kind,
            reasoning,
        });
    }

    fn notify(&self, role: NotificationRole, message: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((role, message.to_string()));
    }
}

/// An `Llm` over `provider` with a recording console and private ids.
pub fn llm(provider: &Arc<MockProvider>, options: LlmOptions) -> (Llm, Arc<RecordingConsole>) {
    let console = Arc::new(RecordingConsole::default());
    let llm = Llm::new(provider.clone(), options)
        .with_io(console.clone())
        .with_ids(ToolRequestIds::new());
    (llm, console)
}

/// Like [`llm`] with a fixed attempt budget.
pub fn llm_with_attempts(
    provider: &Arc<MockProvider>,
    options: LlmOptions,
    attempts: u32,
) -> (Llm, Arc<RecordingConsole>) {
    let (llm, console) = llm(provider, options);
    (
        llm.with_retry_policy(RetryPolicy::default().with_max_attempts(attempts)),
        console,
    )
}

pub fn call(id: &str, name: &str, arguments: &str) -> ToolExecutionRequest {
    ToolExecutionRequest::new(id, name, arguments)
}
