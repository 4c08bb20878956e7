//! Messages exchanged by the command process.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::event_log::EventTuple;
use crate::domain::foundation::{BatchId, CommandIdentifier, ProcessId};

/// A command submitted for processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitCommand {
    /// Command name, e.g. "profile.create".
    pub command: String,
    pub payload: JsonValue,
    pub identifier: CommandIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiator: Option<String>,
}

impl SubmitCommand {
    pub fn new(command: impl Into<String>, payload: JsonValue, identifier: CommandIdentifier) -> Self {
        Self {
            command: command.into(),
            payload,
            identifier,
            initiator: None,
        }
    }

    pub fn with_initiator(mut self, initiator: impl Into<String>) -> Self {
        self.initiator = Some(initiator.into());
        self
    }
}

/// A single validation complaint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub member: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            message: message.into(),
        }
    }
}

/// Result of validating the events a command produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub failures: Vec<ValidationFailure>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn invalid(failures: Vec<ValidationFailure>) -> Self {
        Self { failures }
    }

    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Combines two outcomes; the result is valid only if both are.
    pub fn merge(mut self, other: ValidationOutcome) -> Self {
        self.failures.extend(other.failures);
        self
    }
}

/// Inputs that drive a command process forward.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandProcessEvent {
    Submitted(SubmitCommand),
    Modified { events: Vec<EventTuple> },
    ExternalValidationCompleted(ValidationOutcome),
    InternalValidationCompleted(ValidationOutcome),
    Published { batch_id: BatchId },
    Faulted { reason: String },
}

impl CommandProcessEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CommandProcessEvent::Submitted(_) => "submitted",
            CommandProcessEvent::Modified { .. } => "modified",
            CommandProcessEvent::ExternalValidationCompleted(_) => "external_validation_completed",
            CommandProcessEvent::InternalValidationCompleted(_) => "internal_validation_completed",
            CommandProcessEvent::Published { .. } => "published",
            CommandProcessEvent::Faulted { .. } => "faulted",
        }
    }
}

/// A message on the command process channel.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandProcessMessage {
    pub process_id: ProcessId,
    pub event: CommandProcessEvent,
}

impl CommandProcessMessage {
    pub fn new(process_id: ProcessId, event: CommandProcessEvent) -> Self {
        Self { process_id, event }
    }
}

/// Side effects requested by a transition. The runner executes them.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEffect {
    /// Turn the command into domain events.
    ModifyCommand(SubmitCommand),
    /// Ask an external party to validate; the answer arrives as a message later.
    TriggerExternalValidation {
        command: SubmitCommand,
        events: Vec<EventTuple>,
    },
    /// Run the in-process composite validation.
    ValidateInternally {
        command: SubmitCommand,
        events: Vec<EventTuple>,
    },
    /// Stage the events in a batch and hand it to the outbox.
    PublishEvents { events: Vec<EventTuple> },
    RespondSuccess {
        identifier: CommandIdentifier,
        batch_id: BatchId,
    },
    RespondFailure {
        identifier: CommandIdentifier,
        failures: Vec<ValidationFailure>,
    },
}
