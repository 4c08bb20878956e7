//! Command process ports - the collaborators the command saga talks to.
//!
//! - `CommandModifier` - turns a submitted command into domain events
//! - `CommandValidator` - in-process validation of those events
//! - `ExternalValidationTrigger` - hands validation to another service; the
//!   answer comes back later as a message on the command channel
//! - `CommandResponseSink` - receives the final success/failure response

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::command::{SubmitCommand, ValidationFailure, ValidationOutcome};
use crate::domain::event_log::EventTuple;
use crate::domain::foundation::{BatchId, CommandIdentifier, DomainError, ProcessId};

#[async_trait]
pub trait CommandModifier: Send + Sync {
    /// Produce the events that carry out `command`.
    async fn modify(&self, command: &SubmitCommand) -> Result<Vec<EventTuple>, DomainError>;
}

#[async_trait]
pub trait CommandValidator: Send + Sync {
    async fn validate(
        &self,
        command: &SubmitCommand,
        events: &[EventTuple],
    ) -> Result<ValidationOutcome, DomainError>;
}

#[async_trait]
pub trait ExternalValidationTrigger: Send + Sync {
    /// Request validation. Must not wait for the verdict.
    async fn trigger(
        &self,
        process_id: ProcessId,
        command: &SubmitCommand,
        events: &[EventTuple],
    ) -> Result<(), DomainError>;
}

/// Final answer to a submitted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandResponse {
    Success {
        identifier: CommandIdentifier,
        batch_id: BatchId,
    },
    Failure {
        identifier: CommandIdentifier,
        failures: Vec<ValidationFailure>,
    },
}

impl CommandResponse {
    pub fn identifier(&self) -> &CommandIdentifier {
        match self {
            CommandResponse::Success { identifier, .. }
            | CommandResponse::Failure { identifier, .. } => identifier,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandResponse::Success { .. })
    }
}

#[async_trait]
pub trait CommandResponseSink: Send + Sync {
    async fn respond(&self, response: CommandResponse) -> Result<(), DomainError>;
}
