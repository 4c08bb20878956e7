//! In-memory event log for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::event_log::{BatchStatus, EventBatch, EventLogTuple};
use crate::domain::foundation::{BatchId, DomainError, ErrorCode};
use crate::ports::EventLogWriter;

#[derive(Default)]
struct LogState {
    batches: Vec<EventBatch>,
    events: Vec<EventLogTuple>,
    history: HashMap<BatchId, Vec<BatchStatus>>,
}

impl LogState {
    fn batch_mut(&mut self, batch_id: BatchId) -> Result<&mut EventBatch, DomainError> {
        self.batches
            .iter_mut()
            .find(|b| b.id == batch_id)
            .ok_or_else(|| batch_not_found(batch_id))
    }

    /// The batch, provided it is still in `expected`.
    fn batch_in(
        &mut self,
        batch_id: BatchId,
        expected: BatchStatus,
    ) -> Result<&mut EventBatch, DomainError> {
        let batch = self.batch_mut(batch_id)?;
        if batch.status != expected {
            return Err(status_changed(
                batch_id,
                expected.as_str(),
                batch.status.as_str(),
            ));
        }
        Ok(batch)
    }

    fn record(&mut self, batch: &EventBatch) {
        let history = self.history.entry(batch.id).or_default();
        if history.last() != Some(&batch.status) {
            history.push(batch.status);
        }
    }
}

/// Event log kept in process memory.
///
/// Besides the port it records every status a batch was persisted with,
/// so tests can assert the observed lifecycle.
#[derive(Default)]
pub struct InMemoryEventLog {
    state: Mutex<LogState>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Every distinct status the batch was persisted with, in order.
    pub async fn status_history(&self, batch_id: BatchId) -> Vec<BatchStatus> {
        self.state
            .lock()
            .await
            .history
            .get(&batch_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn batch_count(&self) -> usize {
        self.state.lock().await.batches.len()
    }

    pub async fn all_events(&self) -> Vec<EventLogTuple> {
        self.state.lock().await.events.clone()
    }
}

#[async_trait]
impl EventLogWriter for InMemoryEventLog {
    async fn create_batch(
        &self,
        batch: &EventBatch,
        events: &[EventLogTuple],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        if state.batches.iter().any(|b| b.id == batch.id) {
            return Err(DomainError::new(
                ErrorCode::AlreadyExists,
                format!("Batch already exists: {}", batch.id),
            ));
        }
        state.batches.push(batch.clone());
        state.events.extend_from_slice(events);
        state.record(batch);
        Ok(())
    }

    async fn add_events(
        &self,
        batch_id: BatchId,
        events: &[EventLogTuple],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.batch_in(batch_id, BatchStatus::Initialized)?;
        state.events.extend_from_slice(events);
        Ok(())
    }

    async fn abort_batch(&self, batch_id: BatchId) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        let batch = state.batch_in(batch_id, BatchStatus::Initialized)?;
        batch.status = BatchStatus::Aborted;
        let batch = batch.clone();
        state
            .events
            .iter_mut()
            .filter(|e| e.batch_id == batch_id)
            .for_each(EventLogTuple::mark_aborted);
        state.record(&batch);
        Ok(())
    }

    async fn update_batch(
        &self,
        batch: &EventBatch,
        expected: BatchStatus,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        *state.batch_in(batch.id, expected)? = batch.clone();
        state.record(batch);
        Ok(())
    }

    async fn update_event(&self, event: &EventLogTuple) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        let stored = state
            .events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::EventNotFound,
                    format!("Event not found: {}", event.id),
                )
            })?;
        *stored = event.clone();
        Ok(())
    }

    async fn get_events(&self, batch_id: BatchId) -> Result<Vec<EventLogTuple>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn get_batch(&self, batch_id: BatchId) -> Result<Option<EventBatch>, DomainError> {
        let state = self.state.lock().await;
        Ok(state.batches.iter().find(|b| b.id == batch_id).cloned())
    }

    async fn try_get_next_committed_batch(&self) -> Result<Option<EventBatch>, DomainError> {
        let state = self.state.lock().await;
        let oldest_with = |status: BatchStatus| {
            state
                .batches
                .iter()
                .filter(|b| b.status == status)
                .min_by_key(|b| b.updated_at)
                .cloned()
        };
        Ok(oldest_with(BatchStatus::Processing).or_else(|| oldest_with(BatchStatus::Committed)))
    }
}

fn batch_not_found(batch_id: BatchId) -> DomainError {
    DomainError::new(
        ErrorCode::BatchNotFound,
        format!("Batch not found: {}", batch_id),
    )
    .with_detail("batch_id", batch_id.to_string())
}

fn status_changed(batch_id: BatchId, expected: &str, actual: &str) -> DomainError {
    DomainError::new(
        ErrorCode::InvalidStateTransition,
        format!("Batch {} is {}, expected {}", batch_id, actual, expected),
    )
    .with_detail("batch_id", batch_id.to_string())
    .with_detail("expected", expected)
    .with_detail("actual", actual)
}
