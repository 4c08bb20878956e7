//! Outbox - delivery of committed event batches to the event store.

mod processor;
mod report;
mod worker;

pub use processor::{OutboxProcessor, RetryPolicy};
pub use report::{BatchReport, DrainReport, FailedEvent};
pub use worker::OutboxWorker;
