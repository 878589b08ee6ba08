//! Per-task request/response log.
//!
//! Each task gets a directory `<yyyy-MM-dd-HH-mm-ss> <description>` under the
//! history root. Every attempt writes `<HH-mm.ss> <seq>-request.json` before
//! the call and `<HH-mm.ss> <seq>-<description>.log` after it. Write failures
//! are logged and otherwise ignored.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use chrono::Local;
use regex::Regex;
use tracing::{error, trace};

use crate::provider::ChatRequest;
use crate::types::{ChatMessage, StreamingResult};

/// Serializes directory creation across every logger in the process.
static DIR_LOCK: Mutex<()> = Mutex::new(());

const DESCRIPTION_WORDS: usize = 5;

#[derive(Debug)]
pub struct HistoryLogger {
    dir: Option<PathBuf>,
    sequence: AtomicU32,
}

impl HistoryLogger {
    /// Create the task directory under `root`, suffixing `-n` on collision.
    ///
    /// If the directory cannot be created the logger is disabled.
    pub fn create(root: &Path, task: &str) -> Self {
        let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
        let base = format!("{timestamp} {}", short_description(task));

        let _guard = DIR_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut dir = root.join(&base);
        let mut suffix = 1;
        while dir.exists() {
            dir = root.join(format!("{base}-{suffix}"));
            suffix += 1;
        }
        let dir = match std::fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                error!(path = %dir.display(), error = %e, "failed to create task history directory");
                None
            }
        };
        Self {
            dir,
            sequence: AtomicU32::new(1),
        }
    }

    /// A logger that writes nothing.
    pub fn disabled() -> Self {
        Self {
            dir: None,
            sequence: AtomicU32::new(1),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Write the request before it is sent. Returns the sequence number to
    /// pair with the matching result.
    pub fn log_request(&self, request: &ChatRequest) -> u32 {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let Some(dir) = &self.dir else {
            return seq;
        };
        let path = dir.join(format!("{} {seq:03}-request.json", file_timestamp()));
        match serde_json::to_string_pretty(request) {
            Ok(json) => write_new(&path, &json),
            Err(e) => error!(error = %e, "failed to serialize request for history"),
        }
        seq
    }

    /// Write the outcome of attempt `seq`. `None` means the call was cancelled.
    pub fn log_result(
        &self,
        model: &str,
        request: &ChatRequest,
        result: Option<&StreamingResult>,
        seq: u32,
    ) {
        let Some(dir) = &self.dir else {
            return;
        };
        let mut body = format!(
            "# Request to {model}:\n\n{}\n",
            format_messages(&request.messages)
        );
        if !request.tools.is_empty() {
            body.push_str("# Tools:\n\n");
            let names: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
            body.push_str(&names.join("\n"));
            body.push_str("\n\n");
        }
        let description = match result {
            Some(result) => {
                body.push_str(&format!("# Response:\n\n{}", result.formatted()));
                short_description(&result.description())
            }
            None => {
                body.push_str("# Response:\n\nCancelled");
                "Cancelled".to_string()
            }
        };
        let path = dir.join(format!("{} {seq:03}-{description}.log", file_timestamp()));
        write_new(&path, &body);
    }
}

fn file_timestamp() -> String {
    Local::now().format("%H-%M.%S").to_string()
}

fn write_new(path: &Path, contents: &str) {
    trace!(path = %path.display(), "writing history file");
    let written = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .and_then(|mut f| f.write_all(contents.as_bytes()));
    if let Err(e) = written {
        error!(path = %path.display(), error = %e, "failed to write history file");
    }
}

fn format_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("## {}\n{}\n", m.kind_label(), m.repr()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First few words of `text`, reduced to characters safe in file names.
pub fn short_description(text: &str) -> String {
    static UNSAFE: OnceLock<Option<Regex>> = OnceLock::new();
    let cleaned = match UNSAFE.get_or_init(|| Regex::new(r"[^\p{L}\p{N} _.,-]+").ok()) {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.replace(['/', '\\'], " "),
    };
    let words: Vec<&str> = cleaned.split_whitespace().take(DESCRIPTION_WORDS).collect();
    let joined = words.join(" ");
    let trimmed = joined.trim_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.chars().take(60).collect()
    }
}
