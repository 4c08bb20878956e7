//! Event log entries and their status.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::foundation::{BatchId, EventEnvelope, Timestamp, ValidationError};

/// Delivery status of one staged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    NotProcessed,
    Executed,
    Aborted,
    Error,
}

impl EventStatus {
    /// Processed events are skipped by the outbox.
    pub fn is_processed(&self) -> bool {
        !matches!(self, EventStatus::NotProcessed)
    }

    /// Stable storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::NotProcessed => "not_processed",
            EventStatus::Executed => "executed",
            EventStatus::Aborted => "aborted",
            EventStatus::Error => "error",
        }
    }

    /// Parses a storage name.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        [
            EventStatus::NotProcessed,
            EventStatus::Executed,
            EventStatus::Aborted,
            EventStatus::Error,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
        .ok_or_else(|| ValidationError::invalid_format("event_status", s))
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event addressed to a stream of the event store.
///
/// This is what callers hand to the saga service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTuple {
    pub target_stream: String,
    pub event: EventEnvelope,
}

impl EventTuple {
    pub fn new(target_stream: impl Into<String>, event: EventEnvelope) -> Self {
        Self {
            target_stream: target_stream.into(),
            event,
        }
    }
}

/// A staged event inside a batch of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogTuple {
    pub id: Uuid,
    pub batch_id: BatchId,
    pub event_type: String,
    pub target_stream: String,
    pub event: EventEnvelope,
    pub status: EventStatus,
    /// Number of write attempts against the event store.
    pub attempts: u32,
    /// Last write error, kept for remediation.
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EventLogTuple {
    /// Stages `tuple` in `batch_id`.
    pub fn new(batch_id: BatchId, tuple: EventTuple) -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            batch_id,
            event_type: tuple.event.event_type.clone(),
            target_stream: tuple.target_stream,
            event: tuple.event,
            status: EventStatus::NotProcessed,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records a successful write.
    pub fn mark_executed(&mut self) {
        self.status = EventStatus::Executed;
        self.attempts += 1;
        self.last_error = None;
        self.updated_at = Timestamp::now();
    }

    /// Records a failed write. The status stays unprocessed so the event is retried.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.attempts += 1;
        self.last_error = Some(error.into());
        self.updated_at = Timestamp::now();
    }

    /// Marks the event aborted together with its batch.
    pub fn mark_aborted(&mut self) {
        if !self.status.is_processed() {
            self.status = EventStatus::Aborted;
            self.updated_at = Timestamp::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple() -> EventLogTuple {
        EventLogTuple::new(
            BatchId::new(),
            EventTuple::new("profile-42", EventEnvelope::test_fixture()),
        )
    }

    #[test]
    fn new_tuple_is_not_processed() {
        let t = tuple();
        assert_eq!(t.status, EventStatus::NotProcessed);
        assert_eq!(t.event_type, "profile.updated.v1");
        assert_eq!(t.target_stream, "profile-42");
        assert_eq!(t.attempts, 0);
    }

    #[test]
    fn only_not_processed_is_pending() {
        assert!(!EventStatus::NotProcessed.is_processed());
        assert!(EventStatus::Executed.is_processed());
        assert!(EventStatus::Aborted.is_processed());
        assert!(EventStatus::Error.is_processed());
    }

    #[test]
    fn failure_keeps_event_pending() {
        let mut t = tuple();
        t.record_failure("connection reset");
        assert_eq!(t.status, EventStatus::NotProcessed);
        assert_eq!(t.attempts, 1);
        assert_eq!(t.last_error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn execution_clears_last_error() {
        let mut t = tuple();
        t.record_failure("timeout");
        t.mark_executed();
        assert_eq!(t.status, EventStatus::Executed);
        assert_eq!(t.attempts, 2);
        assert!(t.last_error.is_none());
    }

    #[test]
    fn abort_does_not_touch_executed_event() {
        let mut t = tuple();
        t.mark_executed();
        t.mark_aborted();
        assert_eq!(t.status, EventStatus::Executed);
    }

    #[test]
    fn storage_names_round_trip() {
        for status in [EventStatus::NotProcessed, EventStatus::Executed] {
            assert_eq!(EventStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}
