//! EventStorageClient port - Interface to the append-only event store.
//!
//! The event store is the durable, immutable destination of every event.
//! Writes happen only through the outbox processor; validation is used by the
//! saga service as the admission gate for new batch events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, EventEnvelope, EventId};

/// Acknowledgement of a successful append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEventResult {
    pub event_id: EventId,
    pub stream: String,
    /// Position of the event within its stream, starting at 0.
    pub stream_position: u64,
}

/// Port for the durable event store.
///
/// Implementations must:
/// - Fail by returning `Err`; there is no partial-success return code
/// - Append to `stream`, creating it on first write
#[async_trait]
pub trait EventStorageClient: Send + Sync {
    /// Append one event to a stream.
    async fn write_event(
        &self,
        event: &EventEnvelope,
        stream: &str,
    ) -> Result<WriteEventResult, DomainError>;

    /// Returns true if every event is acceptable to the store.
    async fn validate_events(&self, events: &[EventEnvelope]) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventStorageClient) {}

    #[test]
    fn write_result_serializes() {
        let result = WriteEventResult {
            event_id: EventId::from_string("e1"),
            stream: "profile-1".to_string(),
            stream_position: 3,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stream_position"], 3);
    }
}
