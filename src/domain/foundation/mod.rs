//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, event envelopes and error types
//! that form the vocabulary of the profile service core.

mod command;
mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use command::CommandIdentifier;
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent};
pub use ids::{BatchId, ProcessId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
