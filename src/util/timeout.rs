//! Token timeouts for streaming calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::ProcessingTier;

/// How long to wait for the first token and for each token after it.
///
/// Both are re-armed after every stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub first_token_secs: u64,
    /// First-token timeout for models served from the flex tier.
    pub flex_first_token_secs: u64,
    pub next_token_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            first_token_secs: 300,
            flex_first_token_secs: 900,
            next_token_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn first_token(&self, tier: ProcessingTier) -> Duration {
        match tier {
            ProcessingTier::Flex => Duration::from_secs(self.flex_first_token_secs),
            ProcessingTier::Default => Duration::from_secs(self.first_token_secs),
        }
    }

    pub fn next_token(&self) -> Duration {
        Duration::from_secs(self.next_token_secs)
    }

    /// The timeout for the next wait, depending on whether any event arrived yet.
    pub fn for_wait(&self, awaiting_first_token: bool, tier: ProcessingTier) -> Duration {
        if awaiting_first_token {
            self.first_token(tier)
        } else {
            self.next_token()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flex_tier_waits_longer_for_first_token() {
        let timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.for_wait(true, ProcessingTier::Default), Duration::from_secs(300));
        assert_eq!(timeouts.for_wait(true, ProcessingTier::Flex), Duration::from_secs(900));
        assert_eq!(timeouts.for_wait(false, ProcessingTier::Flex), Duration::from_secs(60));
    }
}
