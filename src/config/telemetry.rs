//! Logging configuration

use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::error::{ConfigError, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive, e.g. `info` or `user_profile_service=debug`.
    /// `RUST_LOG` overrides it when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl TelemetryConfig {
    fn filter(&self) -> Result<EnvFilter, ValidationError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.log_level)
                .map_err(|e| ValidationError::InvalidLogFilter(e.to_string())),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        EnvFilter::try_new(&self.log_level)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidLogFilter(e.to_string()))
    }

    /// Install the global tracing subscriber.
    ///
    /// Fails if a subscriber is already installed.
    pub fn init(&self) -> Result<(), ConfigError> {
        let filter = self.filter()?;
        let registry = tracing_subscriber::registry().with(filter);
        let result = if self.json {
            registry.with(fmt::layer().json()).try_init()
        } else {
            registry.with(fmt::layer().with_target(false)).try_init()
        };
        result.map_err(|e| ConfigError::TelemetryInit(e.to_string()))
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
