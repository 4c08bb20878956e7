//! Event log - batches of events staged for the event store.
//!
//! The log is the relational side of the outbox: the saga service writes
//! batches here, the outbox processor drains them into the event store.

mod batch;
mod tuple;

pub use batch::{BatchStatus, EventBatch};
pub use tuple::{EventLogTuple, EventStatus, EventTuple};
