//! Token usage reported by a completed response.

use serde::{Deserialize, Serialize};

/// Token usage for one completed call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    /// Portion of `input_tokens` served from the provider's prompt cache.
    #[serde(default)]
    pub cached_input_tokens: u32,
    /// Portion of `output_tokens` spent on reasoning.
    #[serde(default)]
    pub reasoning_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    /// Merge another usage into this one (accumulate).
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.cached_input_tokens += other.cached_input_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
        self.output_tokens += other.output_tokens;
    }

    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Share of input tokens that hit the cache, in whole percent.
    pub fn cached_percent(&self) -> u32 {
        if self.input_tokens == 0 {
            return 0;
        }
        ((self.cached_input_tokens as f64 * 100.0) / self.input_tokens as f64).round() as u32
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "token usage: {} input ({} cached), {} output ({} reasoning)",
            self.input_tokens, self.cached_input_tokens, self.output_tokens, self.reasoning_tokens
        )
    }
}
