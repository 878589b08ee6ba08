//! Output sink for echoed tokens and user-facing notifications.

use strum::Display;
use tracing::{debug, info};

/// What kind of output a chunk of echoed text is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    /// Model output.
    Ai,
    /// Commentary produced by relay itself (retry notices, validation errors).
    Custom,
}

/// Audience and purpose of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationRole {
    Info,
    Cost,
    Error,
}

/// Receives echoed tokens and notifications.
///
/// Calls may arrive from the task driving a response stream, so
/// implementations must be cheap and must not block.
pub trait ConsoleIo: Send + Sync {
    /// Echo a chunk of output. `reasoning` marks the reasoning channel.
    fn llm_output(&self, text: &str, kind: MessageKind, reasoning: bool);

    fn notify(&self, role: NotificationRole, message: &str);
}

/// Forwards output and notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConsole;

impl ConsoleIo for TracingConsole {
    fn llm_output(&self, text: &str, kind: MessageKind, reasoning: bool) {
        debug!(target: "relay::output", %kind, reasoning, "{text}");
    }

    fn notify(&self, role: NotificationRole, message: &str) {
        info!(target: "relay::notify", %role, "{message}");
    }
}
