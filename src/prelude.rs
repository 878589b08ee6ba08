//! Convenience re-exports for common use.

pub use crate::config::{LlmOptions, RelayConfig, TimeoutConfig};
pub use crate::error::{ErrorCategory, RelayError, Result};
pub use crate::io::{ConsoleIo, MessageKind, NotificationRole};
pub use crate::llm::Llm;
pub use crate::models::ModelCapabilities;
pub use crate::provider::{ModelProvider, OpenAiCompatibleProvider};
pub use crate::tools::{ToolContext, ToolExecutionRequest, ToolSpecification};
pub use crate::types::{ChatMessage, StreamingResult, ToolChoice, Usage};
