//! Model capabilities descriptor.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Service tier the model is served from. Flex trades latency for price, so
/// first tokens may take much longer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingTier {
    #[default]
    Default,
    Flex,
}

/// Describes what a model can do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelCapabilities {
    /// Native structured tool calling.
    pub supports_tools: bool,
    /// Provider can be told that a tool call is mandatory.
    pub supports_tool_choice_required: bool,
    /// Provider accepts the `parallel_tool_calls` flag at all.
    pub supports_parallel_tool_calls: bool,
    pub supports_json_mode: bool,
    pub supports_json_schema: bool,
    /// Reasoning models think on their own and are not offered the `think` tool.
    pub supports_reasoning: bool,
    /// Reasoning arrives inline as `<think>...</think>` in the text channel.
    pub uses_think_tags: bool,
    pub processing_tier: ProcessingTier,
    pub context_length: usize,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            supports_tools: false,
            supports_tool_choice_required: false,
            supports_parallel_tool_calls: false,
            supports_json_mode: true,
            supports_json_schema: false,
            supports_reasoning: false,
            uses_think_tags: false,
            processing_tier: ProcessingTier::Default,
            context_length: 8192,
        }
    }
}

impl ModelCapabilities {
    /// Full-featured model capabilities.
    pub fn full(context_length: usize) -> Self {
        Self {
            supports_tools: true,
            supports_tool_choice_required: true,
            supports_parallel_tool_calls: true,
            supports_json_mode: true,
            supports_json_schema: true,
            supports_reasoning: false,
            uses_think_tags: false,
            processing_tier: ProcessingTier::Default,
            context_length,
        }
    }

    /// Tool calls must be emulated through JSON output.
    pub fn requires_emulated_tools(&self) -> bool {
        !self.supports_tools
    }

    pub fn with_reasoning(mut self, supports_reasoning: bool) -> Self {
        self.supports_reasoning = supports_reasoning;
        self
    }

    pub fn with_think_tags(mut self, uses_think_tags: bool) -> Self {
        self.uses_think_tags = uses_think_tags;
        self
    }

    pub fn with_processing_tier(mut self, tier: ProcessingTier) -> Self {
        self.processing_tier = tier;
        self
    }

    pub fn with_json_schema(mut self, supports_json_schema: bool) -> Self {
        self.supports_json_schema = supports_json_schema;
        self
    }
}
