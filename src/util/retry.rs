//! Retry policy: bounded attempts with capped exponential backoff.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{RelayError, Result};
use crate::io::{ConsoleIo, NotificationRole};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Backoff after the first failed attempt.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Sleep granularity while backing off; bounds cancellation latency.
    pub poll_interval: Duration,
    /// Minimum gap between countdown notifications.
    pub notify_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(16),
            multiplier: 2.0,
            poll_interval: Duration::from_millis(200),
            notify_interval: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    /// Sleep out the backoff for `attempt`, posting a throttled countdown.
    ///
    /// Returns `Err(RelayError::Interrupted)` as soon as `cancel` fires.
    pub async fn wait_backoff(
        &self,
        attempt: u32,
        max_attempts: u32,
        io: &dyn ConsoleIo,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let backoff = self.backoff(attempt);
        let countdown = backoff > Duration::from_secs(1);
        if countdown {
            io.notify(
                NotificationRole::Info,
                &format!(
                    "LLM issue on attempt {attempt}/{max_attempts} (retrying in {} seconds).",
                    backoff.as_secs()
                ),
            );
        } else {
            io.notify(
                NotificationRole::Info,
                &format!("LLM issue on attempt {attempt}/{max_attempts} (retrying)."),
            );
        }

        let end = Instant::now() + backoff;
        let mut next_notify = Instant::now() + self.notify_interval;
        loop {
            let now = Instant::now();
            if now >= end {
                return Ok(());
            }
            let remaining = end - now;
            if countdown && now >= next_notify {
                let secs_left = remaining.as_secs_f64().ceil() as u64;
                io.notify(
                    NotificationRole::Info,
                    &format!("Retrying in {secs_left} seconds..."),
                );
                next_notify = now + self.notify_interval;
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(RelayError::Interrupted),
                _ = tokio::time::sleep(remaining.min(self.poll_interval)) => {}
            }
        }
    }
}
