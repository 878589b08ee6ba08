//! Route inline `<think>...</think>` content to the reasoning channel.
//!
//! Some models emit their reasoning in the text channel wrapped in think tags.
//! Tags may be split across deltas, so a possible tag prefix at the end of a
//! delta is held back until the next delta decides it.

use futures::StreamExt;

use super::{ChatStream, StreamEvent};
use crate::types::ChatResponse;

const OPEN: &str = "<think>";
const CLOSE: &str = "</think>";

/// Incremental splitter over text deltas.
#[derive(Debug, Default)]
pub struct ThinkTagSplitter {
    in_think: bool,
    pending: String,
}

impl ThinkTagSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one text delta, returning the events it resolves.
    pub fn push(&mut self, delta: &str) -> Vec<StreamEvent> {
        self.pending.push_str(delta);
        let mut events = Vec::new();
        loop {
            let tag = if self.in_think { CLOSE } else { OPEN };
            if let Some(idx) = self.pending.find(tag) {
                let before = self.pending[..idx].to_string();
                self.emit(&mut events, before);
                self.pending.drain(..idx + tag.len());
                self.in_think = !self.in_think;
                continue;
            }
            let keep = partial_tag_suffix(&self.pending, tag);
            let ready = self.pending[..self.pending.len() - keep].to_string();
            self.pending.drain(..self.pending.len() - keep);
            self.emit(&mut events, ready);
            return events;
        }
    }

    /// Flush whatever is still held back.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.pending);
        self.emit(&mut events, rest);
        events
    }

    fn emit(&self, events: &mut Vec<StreamEvent>, chunk: String) {
        if chunk.is_empty() {
            return;
        }
        events.push(if self.in_think {
            StreamEvent::ReasoningDelta(chunk)
        } else {
            StreamEvent::TextDelta(chunk)
        });
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`.
fn partial_tag_suffix(text: &str, tag: &str) -> usize {
    (1..tag.len().min(text.len() + 1))
        .rev()
        .find(|&k| {
            let start = text.len() - k;
            text.is_char_boundary(start) && tag.starts_with(&text[start..])
        })
        .unwrap_or(0)
}

/// Split a complete text into (visible text, reasoning).
pub fn split_think_tags(text: &str) -> (String, Option<String>) {
    let mut splitter = ThinkTagSplitter::new();
    let mut events = splitter.push(text);
    events.extend(splitter.finish());

    let mut visible = String::new();
    let mut reasoning = String::new();
    for event in events {
        match event {
            StreamEvent::TextDelta(t) => visible.push_str(&t),
            StreamEvent::ReasoningDelta(r) => reasoning.push_str(&r),
            StreamEvent::Complete(_) => {}
        }
    }
    (visible, (!reasoning.is_empty()).then_some(reasoning))
}

/// Move think-tagged text in a completed response into its reasoning.
pub fn strip_think_tags(response: &mut ChatResponse) {
    let Some(text) = response.message.text.as_deref() else {
        return;
    };
    let (visible, reasoning) = split_think_tags(text);
    if let Some(reasoning) = reasoning {
        response.message.reasoning = Some(match response.message.reasoning.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}{reasoning}"),
            _ => reasoning,
        });
    }
    response.message.text = Some(visible);
}

/// Wrap a stream so think-tagged text arrives as reasoning deltas.
pub fn intercept(stream: ChatStream) -> ChatStream {
    let transformed = async_stream::stream! {
        let mut splitter = ThinkTagSplitter::new();
        let mut inner = std::pin::pin!(stream);
        while let Some(item) = inner.next().await {
            match item {
                Ok(StreamEvent::TextDelta(delta)) => {
                    for event in splitter.push(&delta) {
                        yield Ok(event);
                    }
                }
                Ok(StreamEvent::Complete(mut response)) => {
                    for event in splitter.finish() {
                        yield Ok(event);
                    }
                    if let Some(response) = response.as_mut() {
                        strip_think_tags(response);
                    }
                    yield Ok(StreamEvent::Complete(response));
                }
                Ok(other) => yield Ok(other),
                Err(e) => {
                    for event in splitter.finish() {
                        yield Ok(event);
                    }
                    yield Err(e);
                    break;
                }
            }
        }
    };
    Box::pin(transformed)
}
