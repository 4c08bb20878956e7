//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Telemetry initialization failed: {0}")]
    TelemetryInit(String),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Outbox poll interval must be at least {min_ms}ms")]
    PollIntervalTooShort { min_ms: u64 },

    #[error("Outbox write attempts must be between 1 and {max}")]
    InvalidWriteAttempts { max: u32 },

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),

    #[error("Command names requiring external validation must not be blank")]
    BlankCommandName,
}
