//! The public entry point: send messages (and optionally tools) to one model.

mod emulate;
pub mod executor;
mod retry;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{LlmOptions, RelayConfig};
use crate::emulation::emulate_tool_results;
use crate::error::Result;
use crate::history::HistoryLogger;
use crate::io::{ConsoleIo, MessageKind, TracingConsole};
use crate::provider::{ChatRequest, ModelProvider};
use crate::tools::{ToolContext, ToolExecutionRequest, ToolRequestIds};
use crate::types::{ChatMessage, StreamingResult, ToolChoice};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::TimeoutConfig;

pub use executor::{EchoOptions, StreamingCallExecutor};
pub use emulate::MAX_EMULATION_ATTEMPTS;

/// Corrective turn sent when a reply that had to call a tool did not.
pub const TOOL_REQUIRED_REMINDER: &str =
    "At least one tool execution request is REQUIRED. Please call a tool.";

/// A model bound to options, an output sink, and a history log.
///
/// Every `send_*` call blocks (asynchronously) until it has a result, and
/// returns `Err` only when cancelled.
pub struct Llm {
    provider: Arc<dyn ModelProvider>,
    options: LlmOptions,
    io: Arc<dyn ConsoleIo>,
    history: HistoryLogger,
    ids: ToolRequestIds,
    timeouts: TimeoutConfig,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Llm {
    /// Defaults: tracing output, no history, process-wide tool ids.
    pub fn new(provider: Arc<dyn ModelProvider>, options: LlmOptions) -> Self {
        Self {
            provider,
            options,
            io: Arc::new(TracingConsole),
            history: HistoryLogger::disabled(),
            ids: ToolRequestIds::process(),
            timeouts: TimeoutConfig::default(),
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Timeouts, attempts, and a history directory taken from `config`.
    pub fn from_config(
        provider: Arc<dyn ModelProvider>,
        options: LlmOptions,
        config: &RelayConfig,
    ) -> Self {
        let history = HistoryLogger::create(&config.history_root(), &options.task);
        Self::new(provider, options)
            .with_history(history)
            .with_timeouts(config.timeouts)
            .with_retry_policy(config.retry_policy())
    }

    pub fn with_io(mut self, io: Arc<dyn ConsoleIo>) -> Self {
        self.io = io;
        self
    }

    pub fn with_history(mut self, history: HistoryLogger) -> Self {
        self.history = history;
        self
    }

    /// Use a private id sequence instead of the process-wide one.
    pub fn with_ids(mut self, ids: ToolRequestIds) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cancelling `cancel` interrupts the current call or backoff.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn options(&self) -> &LlmOptions {
        &self.options
    }

    pub fn history(&self) -> &HistoryLogger {
        &self.history
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Send messages without tools, retrying transient failures.
    pub async fn send_request(&self, messages: Vec<ChatMessage>) -> Result<StreamingResult> {
        self.send_request_with_tools(messages, &ToolContext::empty())
            .await
    }

    /// Send messages with tools, natively or emulated depending on the model.
    ///
    /// With [`ToolChoice::Required`], a toolless reply is answered with a
    /// corrective turn until the attempt budget runs out, and then reported as
    /// [`RelayError::MissingToolCalls`](crate::error::RelayError::MissingToolCalls).
    pub async fn send_request_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        tools: &ToolContext,
    ) -> Result<StreamingResult> {
        self.send_enforcing_tool_choice(messages, tools).await
    }

    fn executor(&self) -> StreamingCallExecutor<'_> {
        StreamingCallExecutor {
            provider: &self.provider,
            io: &self.io,
            history: &self.history,
            timeouts: self.timeouts,
            cancel: &self.cancel,
        }
    }

    fn echo_options(&self, json_fence: bool) -> EchoOptions {
        EchoOptions {
            echo: self.options.echo,
            force_reasoning: self.options.force_reasoning_echo,
            json_fence,
        }
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        if self.options.tag_retain {
            metadata.insert("tags".to_string(), "retain".to_string());
        }
        metadata
    }

    /// One attempt, without retries: the toolless, emulated, or native path.
    async fn send_once(
        &self,
        messages: &[ChatMessage],
        tools: &ToolContext,
    ) -> Result<StreamingResult> {
        if tools.is_empty() {
            let request = ChatRequest::builder()
                .messages(emulate_tool_results(messages))
                .metadata(self.metadata())
                .build();
            return self.executor().execute(request, self.echo_options(false)).await;
        }

        let capabilities = self.provider.capabilities();
        if capabilities.requires_emulated_tools() {
            debug!(model = %self.model_id(), tools = tools.specifications.len(), "emulating tool calls");
            return self.emulate_tool_calls(messages, tools).await;
        }

        let tool_choice = (tools.requires_tool_call()
            && capabilities.supports_tool_choice_required)
            .then_some(ToolChoice::Required);
        let request = ChatRequest::builder()
            .messages(messages.to_vec())
            .tools(tools.specifications.clone())
            .maybe_tool_choice(tool_choice)
            .maybe_parallel_tool_calls(capabilities.supports_parallel_tool_calls.then_some(true))
            .metadata(self.metadata())
            .build();
        let result = self.executor().execute(request, self.echo_options(false)).await?;
        self.echo_planned_calls(result.tool_requests());
        Ok(result)
    }

    fn echo_planned_calls(&self, requests: &[ToolExecutionRequest]) {
        if !self.options.echo || requests.is_empty() {
            return;
        }
        let lines = requests
            .iter()
            .map(ToolExecutionRequest::render)
            .collect::<Vec<_>>()
            .join("\n");
        self.io.llm_output(
            &format!("\nPlanned tool calls:\n{lines}\n"),
            MessageKind::Custom,
            false,
        );
    }
}
