//! In-memory event store for tests and local runs.
//!
//! Streams are plain vectors. Writes to streams registered with
//! `fail_writes_to` return an error, which lets tests exercise partial
//! batch failures.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventStorageClient, WriteEventResult};

#[derive(Default)]
struct StoreState {
    streams: HashMap<String, Vec<EventEnvelope>>,
    /// Every successful write, in write order.
    writes: Vec<(String, EventEnvelope)>,
    failing_streams: HashSet<String>,
}

/// Append-only event store kept in process memory.
#[derive(Default)]
pub struct InMemoryEventStore {
    state: Mutex<StoreState>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `stream` fail until `heal` is called.
    pub async fn fail_writes_to(&self, stream: impl Into<String>) {
        self.state.lock().await.failing_streams.insert(stream.into());
    }

    pub async fn heal(&self, stream: &str) {
        self.state.lock().await.failing_streams.remove(stream);
    }

    // === Test Helpers ===

    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes.len()
    }

    /// Events of one stream in append order.
    pub async fn stream(&self, stream: &str) -> Vec<EventEnvelope> {
        self.state
            .lock()
            .await
            .streams
            .get(stream)
            .cloned()
            .unwrap_or_default()
    }

    /// Target streams of every write, in write order.
    pub async fn written_streams(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .writes
            .iter()
            .map(|(stream, _)| stream.clone())
            .collect()
    }
}

/// Structural admission rules shared by the store adapters.
pub(crate) fn is_acceptable(event: &EventEnvelope) -> bool {
    !event.event_type.trim().is_empty()
        && !event.aggregate_id.trim().is_empty()
        && !event.aggregate_type.trim().is_empty()
        && event.payload.is_object()
}

#[async_trait]
impl EventStorageClient for InMemoryEventStore {
    async fn write_event(
        &self,
        event: &EventEnvelope,
        stream: &str,
    ) -> Result<WriteEventResult, DomainError> {
        let mut state = self.state.lock().await;
        if state.failing_streams.contains(stream) {
            return Err(DomainError::new(
                ErrorCode::EventStoreError,
                format!("Stream unavailable: {}", stream),
            )
            .with_detail("stream", stream));
        }

        let entries = state.streams.entry(stream.to_string()).or_default();
        entries.push(event.clone());
        let stream_position = (entries.len() - 1) as u64;
        state.writes.push((stream.to_string(), event.clone()));

        Ok(WriteEventResult {
            event_id: event.event_id.clone(),
            stream: stream.to_string(),
            stream_position,
        })
    }

    async fn validate_events(&self, events: &[EventEnvelope]) -> Result<bool, DomainError> {
        Ok(events.iter().all(is_acceptable))
    }
}
