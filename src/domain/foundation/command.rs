//! Command correlation primitives.
//!
//! A submitted command carries a `CommandIdentifier`. Its `id` comes from the
//! caller and is echoed back on the success/failure response; `collecting_id`
//! groups the responses of several commands sent together so they can be
//! reported as one.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ValidationError;

/// Correlates a submitted command with its eventual response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandIdentifier {
    /// External correlation id chosen by the caller.
    pub id: String,

    /// Groups responses from a batch of commands.
    pub collecting_id: Uuid,
}

impl CommandIdentifier {
    /// Creates an identifier, rejecting an empty external id.
    pub fn new(id: impl Into<String>, collecting_id: Uuid) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("command_id"));
        }
        Ok(Self { id, collecting_id })
    }

    /// Creates an identifier that is the only member of its collection.
    pub fn single(id: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(id, Uuid::new_v4())
    }
}

impl fmt::Display for CommandIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.collecting_id)
    }
}
