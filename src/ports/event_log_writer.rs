//! EventLogWriter port - Interface for the relational event log.
//!
//! This is the storage side of the Transactional Outbox Pattern:
//!
//! 1. The saga service stages events in a batch and commits it
//! 2. The outbox processor picks the next committed batch
//! 3. Each event is written to the event store and marked executed
//! 4. The batch is marked executed
//!
//! Nothing is ever deleted; the log doubles as an audit trail and as the
//! idempotence record for retries.

use async_trait::async_trait;

use crate::domain::event_log::{BatchStatus, EventBatch, EventLogTuple};
use crate::domain::foundation::{BatchId, DomainError};

/// Port for persisting batches of staged events.
#[async_trait]
pub trait EventLogWriter: Send + Sync {
    /// Persist a new batch together with its initial events.
    async fn create_batch(
        &self,
        batch: &EventBatch,
        events: &[EventLogTuple],
    ) -> Result<(), DomainError>;

    /// Append events to a batch that is still `Initialized`.
    ///
    /// The status check and the insert happen atomically. Fails with
    /// `InvalidStateTransition` when the batch has moved on.
    async fn add_events(&self, batch_id: BatchId, events: &[EventLogTuple])
        -> Result<(), DomainError>;

    /// Mark an `Initialized` batch and its unprocessed events as aborted.
    ///
    /// Fails with `InvalidStateTransition` when the batch has moved on.
    async fn abort_batch(&self, batch_id: BatchId) -> Result<(), DomainError>;

    /// Persist the status of a batch if the stored status still equals
    /// `expected`.
    ///
    /// Fails with `InvalidStateTransition` when another writer changed the
    /// batch first, and with `BatchNotFound` when it does not exist.
    async fn update_batch(
        &self,
        batch: &EventBatch,
        expected: BatchStatus,
    ) -> Result<(), DomainError>;

    /// Persist the status of a single event.
    async fn update_event(&self, event: &EventLogTuple) -> Result<(), DomainError>;

    /// Events of a batch in insertion order.
    async fn get_events(&self, batch_id: BatchId) -> Result<Vec<EventLogTuple>, DomainError>;

    async fn get_batch(&self, batch_id: BatchId) -> Result<Option<EventBatch>, DomainError>;

    /// The next batch the outbox should drain.
    ///
    /// Batches left in `Processing` by an interrupted cycle come first, then
    /// `Committed` batches, oldest first.
    async fn try_get_next_committed_batch(&self) -> Result<Option<EventBatch>, DomainError>;
}
