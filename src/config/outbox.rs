//! Outbox worker configuration
//!
//! This section can be reloaded at runtime; the worker picks up a new poll
//! interval on its next cycle.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MIN_POLL_INTERVAL_MS: u64 = 10;
const MAX_WRITE_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutboxConfig {
    /// Pause between drain cycles
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Write attempts per event within one cycle
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,

    /// Pause between write attempts of the same event
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl OutboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ValidationError::PollIntervalTooShort {
                min_ms: MIN_POLL_INTERVAL_MS,
            });
        }
        if self.write_attempts == 0 || self.write_attempts > MAX_WRITE_ATTEMPTS {
            return Err(ValidationError::InvalidWriteAttempts {
                max: MAX_WRITE_ATTEMPTS,
            });
        }
        Ok(())
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            write_attempts: default_write_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_write_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_poll_every_five_seconds() {
        let config = OutboxConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.write_attempts, 3);
        assert_eq!(config.retry_backoff(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn too_short_interval_is_rejected() {
        let config = OutboxConfig::default().with_poll_interval(Duration::from_millis(1));
        assert_eq!(
            config.validate(),
            Err(ValidationError::PollIntervalTooShort { min_ms: 10 })
        );
    }

    #[test]
    fn write_attempts_must_be_bounded() {
        let none = OutboxConfig {
            write_attempts: 0,
            ..Default::default()
        };
        let many = OutboxConfig {
            write_attempts: 50,
            ..Default::default()
        };
        assert!(none.validate().is_err());
        assert!(many.validate().is_err());
    }

    #[test]
    fn partial_section_fills_defaults() {
        let config: OutboxConfig = serde_json::from_str(r#"{"poll_interval_ms": 250}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.write_attempts, 3);
    }
}
