//! SagaService - Lifecycle of event batches.
//!
//! Callers stage the events of one logical operation in a batch, then either
//! abort it or hand it to the outbox by executing it. Only `Initialized`
//! batches accept events or can be aborted.
//!
//! Status checks are repeated atomically by the event log, so a batch that
//! changed state between read and write fails with `InvalidBatchState`
//! instead of being overwritten.
//!
//! Argument checks happen before any I/O. Every event is checked with the
//! event store's `validate_events` before it is staged.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::event_log::{BatchStatus, EventBatch, EventLogTuple, EventTuple};
use crate::domain::foundation::{BatchId, DomainError, ErrorCode, EventEnvelope, Timestamp};
use crate::ports::{EventLogWriter, EventStorageClient};

/// Errors raised by the saga service.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Batch not found: {0}")]
    BatchNotFound(BatchId),

    #[error("Batch {batch_id} is {actual}, expected {expected}")]
    InvalidBatchState {
        batch_id: BatchId,
        expected: &'static str,
        actual: BatchStatus,
    },

    #[error(transparent)]
    Infrastructure(#[from] DomainError),
}

impl SagaError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SagaError::InvalidArgument(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SagaError::InvalidArgument(_) => ErrorCode::ValidationFailed,
            SagaError::BatchNotFound(_) => ErrorCode::BatchNotFound,
            SagaError::InvalidBatchState { .. } => ErrorCode::InvalidStateTransition,
            SagaError::Infrastructure(e) => e.code,
        }
    }
}

/// Creates, fills, aborts and executes event batches.
pub struct SagaService {
    event_log: Arc<dyn EventLogWriter>,
    event_store: Arc<dyn EventStorageClient>,
}

impl SagaService {
    pub fn new(event_log: Arc<dyn EventLogWriter>, event_store: Arc<dyn EventStorageClient>) -> Self {
        Self {
            event_log,
            event_store,
        }
    }

    /// Create an empty `Initialized` batch.
    pub async fn create_batch(&self) -> Result<BatchId, SagaError> {
        let batch = EventBatch::new();
        self.event_log.create_batch(&batch, &[]).await?;
        debug!(batch_id = %batch.id, "Batch created");
        Ok(batch.id)
    }

    /// Create an `Initialized` batch holding `events`.
    ///
    /// Nothing is persisted if any event is rejected.
    pub async fn create_batch_with_events(
        &self,
        events: Vec<EventTuple>,
    ) -> Result<BatchId, SagaError> {
        check_events(&events)?;
        self.admit(&events).await?;

        let batch = EventBatch::new();
        let staged = stage(batch.id, events);
        self.event_log.create_batch(&batch, &staged).await?;
        debug!(batch_id = %batch.id, events = staged.len(), "Batch created");
        Ok(batch.id)
    }

    /// Append `events` to an `Initialized` batch.
    pub async fn add_events(
        &self,
        batch_id: BatchId,
        events: Vec<EventTuple>,
    ) -> Result<(), SagaError> {
        check_batch_id(batch_id)?;
        check_events(&events)?;

        let batch = self.load(batch_id).await?;
        require(&batch, BatchStatus::accepts_events, "initialized")?;
        self.admit(&events).await?;

        let staged = stage(batch_id, events);
        if let Err(e) = self.event_log.add_events(batch_id, &staged).await {
            return Err(self.lost_race(batch_id, "initialized", e).await);
        }
        debug!(batch_id = %batch_id, events = staged.len(), "Events added");
        Ok(())
    }

    /// Abort an `Initialized` batch. Its events are never delivered.
    pub async fn abort_batch(&self, batch_id: BatchId) -> Result<(), SagaError> {
        check_batch_id(batch_id)?;

        let batch = self.load(batch_id).await?;
        require(&batch, BatchStatus::accepts_events, "initialized")?;

        if let Err(e) = self.event_log.abort_batch(batch_id).await {
            return Err(self.lost_race(batch_id, "initialized", e).await);
        }
        info!(batch_id = %batch_id, "Batch aborted");
        Ok(())
    }

    /// Commit a batch for delivery by the outbox.
    ///
    /// Executing an already `Committed` batch only refreshes its timestamp.
    pub async fn execute_batch(&self, batch_id: BatchId) -> Result<(), SagaError> {
        check_batch_id(batch_id)?;

        let mut batch = self.load(batch_id).await?;
        require(&batch, BatchStatus::is_executable, "initialized or committed")?;

        let expected = batch.status;
        if batch.status == BatchStatus::Committed {
            batch.updated_at = Timestamp::now();
        } else {
            batch
                .transition_to(BatchStatus::Committed)
                .map_err(DomainError::from)?;
        }
        if let Err(e) = self.event_log.update_batch(&batch, expected).await {
            return Err(self
                .lost_race(batch_id, "initialized or committed", e)
                .await);
        }
        info!(batch_id = %batch_id, "Batch committed");
        Ok(())
    }

    /// Current state of a batch.
    pub async fn get_batch(&self, batch_id: BatchId) -> Result<EventBatch, SagaError> {
        check_batch_id(batch_id)?;
        self.load(batch_id).await
    }

    async fn load(&self, batch_id: BatchId) -> Result<EventBatch, SagaError> {
        self.event_log
            .get_batch(batch_id)
            .await?
            .ok_or(SagaError::BatchNotFound(batch_id))
    }

    /// Translate a status conflict reported by the event log into the
    /// batch's current state.
    async fn lost_race(
        &self,
        batch_id: BatchId,
        expected: &'static str,
        error: DomainError,
    ) -> SagaError {
        if error.code != ErrorCode::InvalidStateTransition {
            return error.into();
        }
        match self.load(batch_id).await {
            Ok(batch) => {
                debug!(batch_id = %batch_id, actual = %batch.status, "Batch changed concurrently");
                SagaError::InvalidBatchState {
                    batch_id,
                    expected,
                    actual: batch.status,
                }
            }
            Err(e) => e,
        }
    }

    async fn admit(&self, events: &[EventTuple]) -> Result<(), SagaError> {
        let envelopes: Vec<EventEnvelope> = events.iter().map(|t| t.event.clone()).collect();
        if !self.event_store.validate_events(&envelopes).await? {
            return Err(SagaError::invalid_argument(
                "events were rejected by the event store",
            ));
        }
        Ok(())
    }
}

fn check_batch_id(batch_id: BatchId) -> Result<(), SagaError> {
    if batch_id.is_nil() {
        return Err(SagaError::invalid_argument("batch id must not be empty"));
    }
    Ok(())
}

fn check_events(events: &[EventTuple]) -> Result<(), SagaError> {
    if events.is_empty() {
        return Err(SagaError::invalid_argument("events must not be empty"));
    }
    if let Some(blank) = events.iter().position(|t| t.target_stream.trim().is_empty()) {
        return Err(SagaError::invalid_argument(format!(
            "event {} has no target stream",
            blank
        )));
    }
    Ok(())
}

fn require(
    batch: &EventBatch,
    allowed: fn(&BatchStatus) -> bool,
    expected: &'static str,
) -> Result<(), SagaError> {
    if allowed(&batch.status) {
        Ok(())
    } else {
        Err(SagaError::InvalidBatchState {
            batch_id: batch.id,
            expected,
            actual: batch.status,
        })
    }
}

fn stage(batch_id: BatchId, events: Vec<EventTuple>) -> Vec<EventLogTuple> {
    events
        .into_iter()
        .map(|tuple| EventLogTuple::new(batch_id, tuple))
        .collect()
}
