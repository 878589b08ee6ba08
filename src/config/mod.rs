//! Configuration (layered: defaults < TOML file < environment).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::util::retry::RetryPolicy;

pub use crate::util::timeout::TimeoutConfig;

/// Name of the history directory under the data directory.
pub const HISTORY_DIR_NAME: &str = "llm-history";

/// Per-`Llm` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmOptions {
    /// Short description of the task, used to name its history directory.
    pub task: String,
    /// Accept a non-empty partial response even though the call errored.
    pub allow_partial_responses: bool,
    /// Echo tokens to the console as they stream.
    pub echo: bool,
    /// Echo all output on the reasoning channel.
    pub force_reasoning_echo: bool,
    /// Tag requests for retention by the provider proxy.
    pub tag_retain: bool,
}

impl LlmOptions {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    pub fn with_partial_responses(mut self) -> Self {
        self.allow_partial_responses = true;
        self
    }

    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn with_force_reasoning_echo(mut self) -> Self {
        self.force_reasoning_echo = true;
        self
    }

    pub fn with_tag_retain(mut self) -> Self {
        self.tag_retain = true;
        self
    }
}

/// Process-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Root of the per-task history directories.
    pub history_dir: Option<PathBuf>,
    /// Attempts per request, including the first.
    pub max_attempts: Option<u32>,
    pub timeouts: TimeoutConfig,
}

impl RelayConfig {
    /// Defaults, then the TOML file at `path` (or the default config file if it
    /// exists), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path.map(Path::to_path_buf).or_else(|| {
            Self::default_config_path().filter(|p| p.is_file())
        });
        let config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.with_env()
    }

    /// Defaults overridden by the environment (and `.env`).
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RelayError::Configuration(format!("invalid config: {e}")))
    }

    /// Apply environment overrides on top of this config.
    pub fn with_env(mut self) -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        if let Some(key) = env_any(&["RELAY_API_KEY", "OPENAI_API_KEY"]) {
            self.api_key = Some(key);
        }
        if let Some(url) = env_any(&["RELAY_BASE_URL", "OPENAI_BASE_URL"]) {
            self.base_url = Some(url);
        }
        if let Some(model) = env_any(&["RELAY_MODEL"]) {
            self.model = Some(model);
        }
        if let Some(dir) = env_any(&["RELAY_HISTORY_DIR"]) {
            self.history_dir = Some(PathBuf::from(dir));
        }
        if let Some(n) = env_parse("RELAY_MAX_ATTEMPTS")? {
            self.max_attempts = Some(n);
        }
        if let Some(secs) = env_parse("RELAY_FIRST_TOKEN_TIMEOUT_SECS")? {
            self.timeouts.first_token_secs = secs;
        }
        if let Some(secs) = env_parse("RELAY_FLEX_FIRST_TOKEN_TIMEOUT_SECS")? {
            self.timeouts.flex_first_token_secs = secs;
        }
        if let Some(secs) = env_parse("RELAY_NEXT_TOKEN_TIMEOUT_SECS")? {
            self.timeouts.next_token_secs = secs;
        }
        Ok(self)
    }

    /// `<config dir>/relay/config.toml` for the current user.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "relay").map(|d| d.config_dir().join("config.toml"))
    }

    /// Root history directory: explicit, else the user's data directory.
    pub fn history_root(&self) -> PathBuf {
        self.history_dir.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("", "", "relay")
                .map(|d| d.data_dir().join(HISTORY_DIR_NAME))
                .unwrap_or_else(|| PathBuf::from(HISTORY_DIR_NAME))
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::default();
        match self.max_attempts {
            Some(n) => policy.with_max_attempts(n),
            None => policy,
        }
    }
}

fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_any(&[name]) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RelayError::Configuration(format!("{name}={raw}: {e}"))),
        None => Ok(None),
    }
}
