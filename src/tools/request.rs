//! Tool execution requests and their id sequence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

/// A request from the model to run a tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolExecutionRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

impl ToolExecutionRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the raw arguments as JSON.
    pub fn parsed_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments)
    }

    /// One-line rendering, e.g. `search({"pattern":"foo"})`.
    pub fn render(&self) -> String {
        format!("{}({})", self.name, self.arguments)
    }
}

/// Monotonic id source for emulated tool execution requests.
///
/// Clones share the same counter. Ids are only meaningful within one process.
#[derive(Debug, Clone, Default)]
pub struct ToolRequestIds {
    next: Arc<AtomicU64>,
}

static PROCESS_IDS: OnceLock<ToolRequestIds> = OnceLock::new();

impl ToolRequestIds {
    /// A fresh counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The counter shared by every `Llm` that was not given its own.
    pub fn process() -> Self {
        PROCESS_IDS.get_or_init(Self::new).clone()
    }

    pub fn next_id(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}
