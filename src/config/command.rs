//! Command process configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::command::ProcessSettings;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct CommandConfig {
    /// Commands whose events are validated by an external service
    #[serde(default)]
    pub external_validation: Vec<String>,
}

impl CommandConfig {
    pub fn process_settings(&self) -> ProcessSettings {
        ProcessSettings::new(self.external_validation.iter().cloned())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.external_validation.iter().any(|c| c.trim().is_empty()) {
            return Err(ValidationError::BlankCommandName);
        }
        Ok(())
    }
}
