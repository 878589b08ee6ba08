//! Transport boundary: the provider trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai;
pub mod think_tags;

use std::collections::BTreeMap;

use async_trait::async_trait;
use bon::Builder;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::error::Result;
use crate::models::ModelCapabilities;
use crate::tools::ToolSpecification;
use crate::types::{ChatMessage, ChatResponse, ResponseFormat, ToolChoice};

pub use openai::OpenAiCompatibleProvider;

/// One fully built request for a single streaming call.
#[derive(Debug, Clone, Default, Serialize, Builder)]
pub struct ChatRequest {
    #[builder(default)]
    pub messages: Vec<ChatMessage>,
    /// Declared only for native tool calls.
    #[builder(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpecification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    /// Set only when emulating tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[builder(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// An event on a response stream. Errors travel as `Err` items.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    ReasoningDelta(String),
    /// End of stream. `None` when the provider completed without a response.
    Complete(Option<ChatResponse>),
}

pub type ChatStream = BoxStream<'static, Result<StreamEvent>>;

/// Core trait implemented by model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &str;
    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    fn capabilities(&self) -> &ModelCapabilities;

    /// Issue the request and return the response stream.
    ///
    /// An `Err` here means the transport rejected the request before streaming.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream>;
}
