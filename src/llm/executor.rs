//! One streaming call: issue, wait with re-armed token timeouts, assemble.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{RelayError, Result};
use crate::history::HistoryLogger;
use crate::io::{ConsoleIo, MessageKind, NotificationRole};
use crate::provider::{think_tags, ChatRequest, ModelProvider, StreamEvent};
use crate::types::{ChatResponse, NullSafeResponse, StreamingResult};
use crate::util::timeout::TimeoutConfig;

const JSON_FENCE_OPEN: &str = "\n```json\n";
const JSON_FENCE_CLOSE: &str = "\n```";

/// Echo settings for one call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoOptions {
    pub echo: bool,
    /// Echo text tokens on the reasoning channel too.
    pub force_reasoning: bool,
    /// Wrap echoed text in a json code fence.
    pub json_fence: bool,
}

/// Performs exactly one provider call per [`execute`](Self::execute).
pub struct StreamingCallExecutor<'a> {
    pub(crate) provider: &'a Arc<dyn ModelProvider>,
    pub(crate) io: &'a Arc<dyn ConsoleIo>,
    pub(crate) history: &'a HistoryLogger,
    pub(crate) timeouts: TimeoutConfig,
    pub(crate) cancel: &'a CancellationToken,
}

#[derive(Default)]
struct CallState {
    text: String,
    reasoning: String,
    response: Option<ChatResponse>,
    error: Option<RelayError>,
    fence_open: bool,
}

/// State shared between the waiting caller and the task pumping the stream.
struct CallShared {
    state: Mutex<CallState>,
    first_token: AtomicBool,
    completed: AtomicBool,
    cancelled: AtomicBool,
    /// Starts with zero permits; one permit is added per handled event.
    signal: Semaphore,
    io: Arc<dyn ConsoleIo>,
    echo: EchoOptions,
}

impl CallShared {
    fn new(io: Arc<dyn ConsoleIo>, echo: EchoOptions) -> Self {
        Self {
            state: Mutex::new(CallState::default()),
            first_token: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            signal: Semaphore::new(0),
            io,
            echo,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle one stream event and release the waiter exactly once.
    fn on_event(&self, event: Result<StreamEvent>) {
        if !self.cancelled.load(Ordering::SeqCst) {
            let mut state = self.lock();
            self.apply(&mut state, event);
        }
        self.signal.add_permits(1);
    }

    fn apply(&self, state: &mut CallState, event: Result<StreamEvent>) {
        if self.completed.load(Ordering::SeqCst) {
            return;
        }
        match event {
            Ok(StreamEvent::TextDelta(text)) => {
                self.first_token.store(true, Ordering::SeqCst);
                if self.echo.echo {
                    if self.echo.json_fence && !state.fence_open {
                        self.io.llm_output(JSON_FENCE_OPEN, MessageKind::Ai, false);
                        state.fence_open = true;
                    }
                    self.io
                        .llm_output(&text, MessageKind::Ai, self.echo.force_reasoning);
                }
                state.text.push_str(&text);
            }
            Ok(StreamEvent::ReasoningDelta(reasoning)) => {
                self.first_token.store(true, Ordering::SeqCst);
                if self.echo.echo {
                    self.io.llm_output(&reasoning, MessageKind::Ai, true);
                }
                state.reasoning.push_str(&reasoning);
            }
            Ok(StreamEvent::Complete(Some(response))) => {
                self.close_fence(state);
                if self.echo.echo {
                    self.io.llm_output("\n", MessageKind::Ai, false);
                }
                state.response = Some(response);
                self.completed.store(true, Ordering::SeqCst);
            }
            Ok(StreamEvent::Complete(None)) => {
                self.fail(state, RelayError::Stream("provider completed without a response".into()));
            }
            Err(e) => self.fail(state, e),
        }
    }

    fn fail(&self, state: &mut CallState, error: RelayError) {
        let retry = if error.is_non_retriable() {
            "non-retriable"
        } else {
            "retry-able"
        };
        self.io
            .notify(NotificationRole::Error, &format!("LLM Error: {error} ({retry})"));
        self.close_fence(state);
        state.error = Some(error);
        self.completed.store(true, Ordering::SeqCst);
    }

    /// Record a timeout unless the call already finished.
    fn time_out(&self, error: RelayError) {
        let mut state = self.lock();
        if !self.completed.load(Ordering::SeqCst) {
            self.close_fence(&mut state);
            state.error = Some(error);
        }
        self.cancelled.store(true, Ordering::SeqCst);
        self.completed.store(true, Ordering::SeqCst);
    }

    fn close_fence(&self, state: &mut CallState) {
        if state.fence_open {
            self.io.llm_output(JSON_FENCE_CLOSE, MessageKind::Ai, false);
            state.fence_open = false;
        }
    }
}

impl StreamingCallExecutor<'_> {
    /// Send `request` and wait for the stream to finish, time out, or be cancelled.
    ///
    /// The only `Err` is [`RelayError::Interrupted`]; every other failure is
    /// reported inside the returned [`StreamingResult`].
    pub async fn execute(&self, request: ChatRequest, echo: EchoOptions) -> Result<StreamingResult> {
        if self.cancel.is_cancelled() {
            return Err(RelayError::Interrupted);
        }

        let model = self.provider.model_id().to_string();
        let tier = self.provider.capabilities().processing_tier;
        let inline_think = self.provider.capabilities().uses_think_tags;
        let seq = self.history.log_request(&request);
        debug!(model = %model, seq, messages = request.messages.len(), "issuing streaming call");

        let shared = Arc::new(CallShared::new(Arc::clone(self.io), echo));
        let pump = {
            let shared = Arc::clone(&shared);
            let provider = Arc::clone(self.provider);
            let request = request.clone();
            tokio::spawn(async move {
                let stream = match provider.stream_chat(&request).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        shared.on_event(Err(e));
                        shared.cancelled.store(true, Ordering::SeqCst);
                        return;
                    }
                };
                let mut stream = if inline_think {
                    think_tags::intercept(stream)
                } else {
                    stream
                };
                while let Some(event) = stream.next().await {
                    let terminal = matches!(event, Ok(StreamEvent::Complete(_)) | Err(_));
                    shared.on_event(event);
                    if terminal {
                        return;
                    }
                }
                shared.on_event(Err(RelayError::Stream(
                    "stream ended without a completion event".into(),
                )));
            })
        };

        while !shared.completed.load(Ordering::SeqCst) {
            let awaiting_first = !shared.first_token.load(Ordering::SeqCst);
            let wait = self.timeouts.for_wait(awaiting_first, tier);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    shared.cancelled.store(true, Ordering::SeqCst);
                    pump.abort();
                    debug!(model = %model, seq, "streaming call cancelled");
                    self.history.log_result(&model, &request, None, seq);
                    return Err(RelayError::Interrupted);
                }
                acquired = tokio::time::timeout(wait, shared.signal.acquire()) => match acquired {
                    Ok(Ok(permit)) => permit.forget(),
                    Ok(Err(_)) => break,
                    Err(_) => {
                        let millis = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
                        warn!(model = %model, seq, awaiting_first, timeout_ms = millis, "streaming call timed out");
                        shared.time_out(RelayError::Timeout(millis));
                        pump.abort();
                    }
                },
            }
        }

        let state = std::mem::take(&mut *shared.lock());
        let result = assemble(state);
        if let Some(usage) = result.usage() {
            debug!(model = %model, seq, "{usage}");
        }
        self.history.log_result(&model, &request, Some(&result), seq);
        Ok(result)
    }
}

fn assemble(state: CallState) -> StreamingResult {
    match (state.error, state.response) {
        (Some(error), _) if state.text.is_empty() && state.reasoning.is_empty() => {
            StreamingResult::failure(error)
        }
        (Some(error), _) => StreamingResult::partial(
            NullSafeResponse::partial(state.text, state.reasoning),
            error,
        ),
        (None, Some(response)) => StreamingResult::from_response(response),
        (None, None) => {
            debug_assert!(false, "streaming call completed with neither a response nor an error");
            StreamingResult::failure(RelayError::InvalidState(
                "call completed without a response or an error".into(),
            ))
        }
    }
}
