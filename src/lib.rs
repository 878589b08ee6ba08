//! Relay: resilient streaming LLM calls.
//!
//! Sends chat requests to an OpenAI-compatible endpoint, consumes the token
//! stream under first-token and next-token timeouts, retries transient
//! failures with backoff, and emulates tool calling over JSON output for
//! models that lack native support.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay::prelude::*;
//!
//! # async fn example() -> relay::error::Result<()> {
//! let config = RelayConfig::from_env()?;
//! let provider = OpenAiCompatibleProvider::from_config(&config, "gpt-4o-mini", ModelCapabilities::full(128_000))?;
//! let llm = Llm::new(Arc::new(provider), LlmOptions::new("greeting"));
//! let result = llm.send_request(vec![ChatMessage::user("Hello!")]).await?;
//! println!("{}", result.text());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod emulation;
pub mod error;
pub mod history;
pub mod io;
pub mod llm;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
