//! One streaming call: assembly, timeouts, cancellation, echo.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{llm_with_attempts, MockProvider, Step};
use relay::config::LlmOptions;
use relay::error::{ErrorCategory, RelayError};
use relay::io::{MessageKind, NotificationRole};
use relay::models::{ModelCapabilities, ProcessingTier};
use relay::types::ChatMessage;
use tokio_util::sync::CancellationToken;

fn hello() -> Vec<ChatMessage> {
    vec![ChatMessage::user("hello")]
}

#[tokio::test]
async fn streamed_chunks_assemble_into_a_success() {
    let provider = Arc::new(MockProvider::native().then(Step::chunks(&["Hel", "lo ", "there"])));
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    assert!(result.is_success());
    assert!(result.error().is_none());
    assert_eq!(result.text(), "Hello there");
    assert_eq!(result.retries(), 0);
    assert!(result.original().is_some());
    assert_eq!(result.usage().map(|u| u.output_tokens), Some(20));
}

#[tokio::test]
async fn error_before_any_token_carries_no_payload() {
    let provider = Arc::new(
        MockProvider::native().then(Step::FailAfter(vec![], RelayError::api(503, "overloaded"))),
    );
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default().with_partial_responses(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    assert!(result.response().is_none());
    assert_eq!(result.error().and_then(RelayError::status), Some(503));
}

#[tokio::test]
async fn error_after_tokens_keeps_exact_partial_text() {
    let provider = Arc::new(MockProvider::native().then(Step::FailAfter(
        vec!["The ".into(), "answer ".into(), "is".into()],
        RelayError::Stream("connection reset".into()),
    )));
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default().with_partial_responses(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    assert!(result.is_partial());
    assert_eq!(result.text(), "The answer is");
    assert!(result.original().is_none(), "partial payload must be synthetic");
    assert!(matches!(result.error(), Some(RelayError::Stream(_))));
}

#[tokio::test(start_paused = true)]
async fn silent_stream_times_out_waiting_for_first_token() {
    let provider = Arc::new(MockProvider::native().then(Step::hang()));
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    let error = result.error().unwrap();
    assert!(matches!(error, RelayError::Timeout(300_000)));
    assert_eq!(error.status(), Some(504));
    assert_eq!(error.category(), ErrorCategory::Timeout);
    assert!(result.response().is_none());
}

#[tokio::test(start_paused = true)]
async fn flex_tier_waits_longer_for_first_token() {
    let provider = Arc::new(
        MockProvider::new(ModelCapabilities::full(8192).with_processing_tier(ProcessingTier::Flex))
            .then(Step::hang()),
    );
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    assert!(matches!(result.error(), Some(RelayError::Timeout(900_000))));
}

#[tokio::test(start_paused = true)]
async fn stall_after_tokens_uses_next_token_timeout() {
    let provider = Arc::new(
        MockProvider::native().then(Step::HangAfter(vec!["par".into(), "tial".into()])),
    );
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default().with_partial_responses(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    assert!(matches!(result.error(), Some(RelayError::Timeout(60_000))));
    assert_eq!(result.text(), "partial");
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_rearmed_after_every_token() {
    let chunks = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let provider = Arc::new(MockProvider::native().then(Step::Slow(chunks, Duration::from_secs(59))));
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    assert!(result.is_success(), "{:?}", result.error());
    assert_eq!(result.text(), "abc");
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_waiting_call() {
    let provider = Arc::new(MockProvider::native().then(Step::hang()));
    let cancel = CancellationToken::new();
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default(), 1);
    let llm = llm.with_cancellation(cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let err = llm.send_request(hello()).await.unwrap_err();
    assert!(matches!(err, RelayError::Interrupted));
}

#[tokio::test]
async fn cancelled_token_fails_before_issuing() {
    let provider = Arc::new(MockProvider::native());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default(), 1);

    let err = llm
        .with_cancellation(cancel)
        .send_request(hello())
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Interrupted));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn transport_errors_are_announced_with_retriability() {
    let provider = Arc::new(
        MockProvider::native().then(Step::Reject(RelayError::api(503, "overloaded"))),
    );
    let (llm, console) = llm_with_attempts(&provider, LlmOptions::default(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    assert!(result.error().is_some());
    assert!(console.notifications().contains(&(
        NotificationRole::Error,
        "LLM Error: API error (status 503): overloaded (retry-able)".to_string()
    )));
}

#[tokio::test]
async fn echo_streams_reasoning_then_text() {
    let provider = Arc::new(MockProvider::native().then(Step::Reasoned {
        reasoning: "weighing options".into(),
        text: "pick B".into(),
    }));
    let (llm, console) = llm_with_attempts(&provider, LlmOptions::default().with_echo(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    assert_eq!(result.reasoning(), Some("weighing options"));
    let outputs = console.outputs();
    assert_eq!(outputs[0].text, "weighing options");
    assert!(outputs[0].reasoning);
    assert_eq!(outputs[1].text, "pick B");
    assert!(!outputs[1].reasoning);
    assert_eq!(outputs.last().map(|o| o.text.as_str()), Some("\n"));
    assert!(outputs.iter().all(|o| o.kind == MessageKind::Ai));
}

#[tokio::test]
async fn nothing_is_echoed_without_echo() {
    let provider = Arc::new(MockProvider::native().then(Step::text("quiet")));
    let (llm, console) = llm_with_attempts(&provider, LlmOptions::default(), 1);

    llm.send_request(hello()).await.unwrap();

    assert!(console.outputs().is_empty());
}

#[tokio::test]
async fn inline_think_tags_move_to_reasoning() {
    let provider = Arc::new(
        MockProvider::new(ModelCapabilities::full(8192).with_think_tags(true))
            .then(Step::chunks(&["<think>hm", "m</think>ans", "wer"])),
    );
    let (llm, _) = llm_with_attempts(&provider, LlmOptions::default(), 1);

    let result = llm.send_request(hello()).await.unwrap();

    assert_eq!(result.text(), "answer");
    assert_eq!(result.reasoning(), Some("hmm"));
}
