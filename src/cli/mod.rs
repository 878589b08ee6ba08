//! CLI entry point for relay.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::io::{ConsoleIo, MessageKind, NotificationRole};
use crate::tools::{ParameterType, ToolSpecification};

/// Relay CLI
#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Resilient streaming LLM calls")]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one prompt and stream the reply
    Chat(ChatArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model id (falls back to RELAY_MODEL, then gpt-4o-mini)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Offer demo tools and force the JSON emulation path
    #[arg(long)]
    pub emulate_tools: bool,

    /// With --emulate-tools, use free-form JSON objects instead of a JSON schema
    #[arg(long, requires = "emulate_tools")]
    pub json_object: bool,

    /// Require at least one tool call
    #[arg(long, requires = "emulate_tools")]
    pub require_tool: bool,

    /// Write the request/response history under this directory
    #[arg(long)]
    pub history_dir: Option<PathBuf>,

    /// User prompt (positional)
    pub prompt: String,
}

/// Tools offered by `relay chat --emulate-tools`.
pub fn demo_tools() -> Vec<ToolSpecification> {
    vec![
        ToolSpecification::builder("search_files", "Search the workspace for files whose content matches a pattern")
            .string("pattern", "Regular expression to search for", true)
            .array("paths", ParameterType::String, "Directories to search; defaults to the whole workspace", false)
            .build(),
        ToolSpecification::builder("read_file", "Read a file from the workspace")
            .string("path", "Workspace-relative path", true)
            .integer("max_lines", "Stop after this many lines", false)
            .build(),
    ]
}

/// Prints echoed output to stdout and notifications to stderr.
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl ConsoleIo for StdoutConsole {
    fn llm_output(&self, text: &str, _kind: MessageKind, _reasoning: bool) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn notify(&self, role: NotificationRole, message: &str) {
        eprintln!("[{role}] {message}");
    }
}
