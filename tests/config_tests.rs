//! Tests for layered configuration.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use relay::config::{RelayConfig, HISTORY_DIR_NAME};
use relay::error::RelayError;
use relay::models::ProcessingTier;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 10] = [
    "RELAY_API_KEY",
    "OPENAI_API_KEY",
    "RELAY_BASE_URL",
    "OPENAI_BASE_URL",
    "RELAY_MODEL",
    "RELAY_HISTORY_DIR",
    "RELAY_MAX_ATTEMPTS",
    "RELAY_FIRST_TOKEN_TIMEOUT_SECS",
    "RELAY_FLEX_FIRST_TOKEN_TIMEOUT_SECS",
    "RELAY_NEXT_TOKEN_TIMEOUT_SECS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    /// Save and clear every config variable.
    fn clean() -> Self {
        let saved = CONFIG_ENV_VARS
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        for key in CONFIG_ENV_VARS {
            std::env::remove_var(key);
        }
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn defaults_without_environment() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::clean();

    let config = RelayConfig::from_env().unwrap();

    assert!(config.api_key.is_none());
    assert_eq!(config.retry_policy().max_attempts, 8);
    assert_eq!(config.timeouts.first_token(ProcessingTier::Default), Duration::from_secs(300));
    assert_eq!(config.timeouts.first_token(ProcessingTier::Flex), Duration::from_secs(900));
    assert_eq!(config.timeouts.next_token(), Duration::from_secs(60));
    assert!(config.history_root().ends_with(HISTORY_DIR_NAME));
}

#[test]
fn relay_variables_win_over_openai_fallbacks() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::clean();
    std::env::set_var("OPENAI_API_KEY", "openai-key");
    std::env::set_var("RELAY_API_KEY", "relay-key");
    std::env::set_var("OPENAI_BASE_URL", "http://fallback/v1");

    let config = RelayConfig::from_env().unwrap();

    assert_eq!(config.api_key.as_deref(), Some("relay-key"));
    assert_eq!(config.base_url.as_deref(), Some("http://fallback/v1"));
}

#[test]
fn environment_overrides_the_file() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::clean();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        model = "from-file"
        max_attempts = 2

        [timeouts]
        first_token_secs = 30
        next_token_secs = 5
        "#,
    )
    .unwrap();
    std::env::set_var("RELAY_NEXT_TOKEN_TIMEOUT_SECS", "7");
    std::env::set_var("RELAY_HISTORY_DIR", "/tmp/relay-history");

    let config = RelayConfig::load(Some(&path)).unwrap();

    assert_eq!(config.model.as_deref(), Some("from-file"));
    assert_eq!(config.retry_policy().max_attempts, 2);
    assert_eq!(config.timeouts.first_token_secs, 30);
    assert_eq!(config.timeouts.next_token_secs, 7);
    assert_eq!(config.history_root(), PathBuf::from("/tmp/relay-history"));
}

#[test]
fn unparseable_numbers_are_configuration_errors() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::clean();
    std::env::set_var("RELAY_MAX_ATTEMPTS", "lots");

    let err = RelayConfig::from_env().unwrap_err();

    assert!(matches!(err, RelayError::Configuration(m) if m.contains("RELAY_MAX_ATTEMPTS=lots")));
}

#[test]
fn missing_config_file_is_reported() {
    let err = RelayConfig::from_file(std::path::Path::new("/definitely/not/here.toml")).unwrap_err();
    assert!(matches!(err, RelayError::Configuration(m) if m.contains("cannot read")));
}
