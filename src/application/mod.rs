//! Application layer - Services and handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//!
//! - `saga` - batch lifecycle on top of the event log
//! - `outbox` - drains committed batches into the event store
//! - `locking` - per-key creation locks
//! - `handlers` - first-level projection handlers
//! - `command` - command process runner

pub mod command;
pub mod handlers;
pub mod locking;
pub mod outbox;
pub mod saga;

pub use command::{CommandHandle, CommandPorts, CommandProcessor, CompositeValidator};
pub use handlers::{FunctionCreatedHandler, ProfileCreatedHandler, ProjectionError};
pub use locking::{CreationLock, CreationLockService, LockError};
pub use outbox::{BatchReport, DrainReport, FailedEvent, OutboxProcessor, OutboxWorker, RetryPolicy};
pub use saga::{SagaError, SagaService};
