//! In-memory command process collaborators.
//!
//! - `InMemoryResponseCollector` gathers responses per collecting id
//! - `RecordingValidationTrigger` records external validation requests

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::domain::command::SubmitCommand;
use crate::domain::event_log::EventTuple;
use crate::domain::foundation::{DomainError, ErrorCode, ProcessId};
use crate::ports::{CommandResponse, CommandResponseSink, ExternalValidationTrigger};

/// Collects command responses grouped by `collecting_id`.
#[derive(Default)]
pub struct InMemoryResponseCollector {
    responses: Mutex<HashMap<Uuid, Vec<CommandResponse>>>,
    arrived: Notify,
}

impl InMemoryResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses received so far for one collection, in arrival order.
    pub async fn responses_for(&self, collecting_id: Uuid) -> Vec<CommandResponse> {
        self.responses
            .lock()
            .await
            .get(&collecting_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn total(&self) -> usize {
        self.responses.lock().await.values().map(Vec::len).sum()
    }

    /// Waits until `count` responses for the collection arrived.
    ///
    /// Fails with `Cancelled` once `timeout` elapses.
    pub async fn wait_for(
        &self,
        collecting_id: Uuid,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<CommandResponse>, DomainError> {
        let wait = async {
            loop {
                let notified = self.arrived.notified();
                let current = self.responses_for(collecting_id).await;
                if current.len() >= count {
                    return current;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            DomainError::new(
                ErrorCode::Cancelled,
                format!("Timed out waiting for {} responses", count),
            )
            .with_detail("collecting_id", collecting_id.to_string())
        })
    }
}

#[async_trait]
impl CommandResponseSink for InMemoryResponseCollector {
    async fn respond(&self, response: CommandResponse) -> Result<(), DomainError> {
        let collecting_id = response.identifier().collecting_id;
        self.responses
            .lock()
            .await
            .entry(collecting_id)
            .or_default()
            .push(response);
        self.arrived.notify_waiters();
        Ok(())
    }
}

/// A validation request handed to another service.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRequest {
    pub process_id: ProcessId,
    pub command: SubmitCommand,
    pub events: Vec<EventTuple>,
}

/// External validation trigger that only records requests.
///
/// The verdict is delivered by whoever plays the external validator,
/// as an `ExternalValidationCompleted` message.
#[derive(Default)]
pub struct RecordingValidationTrigger {
    requests: Mutex<Vec<ValidationRequest>>,
}

impl RecordingValidationTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn requests(&self) -> Vec<ValidationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ExternalValidationTrigger for RecordingValidationTrigger {
    async fn trigger(
        &self,
        process_id: ProcessId,
        command: &SubmitCommand,
        events: &[EventTuple],
    ) -> Result<(), DomainError> {
        self.requests.lock().await.push(ValidationRequest {
            process_id,
            command: command.clone(),
            events: events.to_vec(),
        });
        Ok(())
    }
}
