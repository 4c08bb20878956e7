//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the core and the outside world. Adapters implement these ports.
//!
//! ## Outbox Ports
//!
//! - `EventLogWriter` - Relational log of batches awaiting delivery
//! - `EventStorageClient` - Append-only event store the outbox drains into
//!
//! ## Projection Ports
//!
//! - `FirstLevelProjectionRepository` - Transactional entity store with existence checks
//!
//! ## Command Process Ports
//!
//! - `CommandModifier`, `CommandValidator`, `ExternalValidationTrigger`, `CommandResponseSink`

mod command_process;
mod event_log_writer;
mod event_storage_client;
mod projection_repository;

pub use command_process::{
    CommandModifier, CommandResponse, CommandResponseSink, CommandValidator,
    ExternalValidationTrigger,
};
pub use event_log_writer::EventLogWriter;
pub use event_storage_client::{EventStorageClient, WriteEventResult};
pub use projection_repository::{FirstLevelProjectionRepository, ProjectionTransaction};
