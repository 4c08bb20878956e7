//! Outcome of a drain cycle.
//!
//! A cycle never fails because a single event could not be written. Such
//! events stay unprocessed in the event log and are listed here instead.

use uuid::Uuid;

use crate::domain::event_log::EventLogTuple;
use crate::domain::foundation::{BatchId, EventId};

/// An event the store refused during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEvent {
    /// Id of the event log entry.
    pub log_id: Uuid,
    pub event_id: EventId,
    pub target_stream: String,
    pub attempts: u32,
    pub error: String,
}

impl From<&EventLogTuple> for FailedEvent {
    fn from(tuple: &EventLogTuple) -> Self {
        Self {
            log_id: tuple.id,
            event_id: tuple.event.event_id.clone(),
            target_stream: tuple.target_stream.clone(),
            attempts: tuple.attempts,
            error: tuple.last_error.clone().unwrap_or_default(),
        }
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_id: BatchId,
    /// Events written in this cycle.
    pub executed: usize,
    /// Events already processed by an earlier cycle.
    pub skipped: usize,
    pub failed: Vec<FailedEvent>,
    /// False if the cycle was cancelled before the batch finished.
    pub completed: bool,
}

impl BatchReport {
    pub fn new(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            executed: 0,
            skipped: 0,
            failed: Vec::new(),
            completed: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.completed && self.failed.is_empty()
    }
}

/// Result of `OutboxProcessor::check_and_process_events`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub batches: Vec<BatchReport>,
    pub cancelled: bool,
}

impl DrainReport {
    pub fn cancelled_before_start() -> Self {
        Self {
            batches: Vec::new(),
            cancelled: true,
        }
    }

    /// True if there was nothing to drain.
    pub fn is_idle(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn executed_events(&self) -> usize {
        self.batches.iter().map(|b| b.executed).sum()
    }

    /// Events left unprocessed that a later redrive may deliver.
    pub fn retryable_events(&self) -> impl Iterator<Item = &FailedEvent> {
        self.batches.iter().flat_map(|b| b.failed.iter())
    }
}
