//! Application configuration module
//!
//! Configuration is loaded from environment variables with the `UPS` prefix
//! using the `config` and `dotenvy` crates. Nested values are separated by a
//! double underscore.
//!
//! # Example
//!
//! ```no_run
//! use user_profile_service::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Draining every {:?}", config.outbox.poll_interval());
//! ```

mod command;
mod database;
mod error;
mod outbox;
mod projection;
mod telemetry;

pub use command::CommandConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use outbox::OutboxConfig;
pub use projection::ProjectionConfig;
pub use telemetry::TelemetryConfig;

use serde::Deserialize;

const ENV_PREFIX: &str = "UPS";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection for the event log and event store
    pub database: DatabaseConfig,

    /// Outbox worker cadence and write retries
    #[serde(default)]
    pub outbox: OutboxConfig,

    /// Duplicate policies of the first-level projection
    #[serde(default)]
    pub projection: ProjectionConfig,

    /// Command process routing
    #[serde(default)]
    pub command: CommandConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `UPS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Splits `UPS__COMMAND__EXTERNAL_VALIDATION` on commas
    ///
    /// # Environment Variable Format
    ///
    /// - `UPS__DATABASE__URL=postgres://...` -> `database.url`
    /// - `UPS__OUTBOX__POLL_INTERVAL_MS=5000` -> `outbox.poll_interval_ms`
    /// - `UPS__PROJECTION__USERS=allow` -> `projection.users`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("command.external_validation"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.outbox.validate()?;
        self.command.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}
