//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the core to external systems:
//! - `event_log` - Relational event log (in-memory, PostgreSQL)
//! - `event_store` - Append-only event store (in-memory, PostgreSQL)
//! - `projection` - First-level projection store (in-memory)
//! - `command` - Command response collection and validation triggers

pub mod command;
pub mod event_log;
pub mod event_store;
pub mod projection;

pub use command::{InMemoryResponseCollector, RecordingValidationTrigger, ValidationRequest};
pub use event_log::{InMemoryEventLog, PostgresEventLog};
pub use event_store::{InMemoryEventStore, PostgresEventStore};
pub use projection::InMemoryProjectionRepository;
