//! Internal validation of the events a command produced.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::command::{SubmitCommand, ValidationFailure, ValidationOutcome};
use crate::domain::event_log::EventTuple;
use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{CommandValidator, EventStorageClient};

/// Domain rules of `inner` plus the event store's admission check.
pub struct CompositeValidator {
    inner: Arc<dyn CommandValidator>,
    event_store: Arc<dyn EventStorageClient>,
}

impl CompositeValidator {
    pub fn new(inner: Arc<dyn CommandValidator>, event_store: Arc<dyn EventStorageClient>) -> Self {
        Self { inner, event_store }
    }
}

#[async_trait]
impl CommandValidator for CompositeValidator {
    async fn validate(
        &self,
        command: &SubmitCommand,
        events: &[EventTuple],
    ) -> Result<ValidationOutcome, DomainError> {
        let mut outcome = self.inner.validate(command, events).await?;

        let envelopes: Vec<EventEnvelope> = events.iter().map(|t| t.event.clone()).collect();
        if !self.event_store.validate_events(&envelopes).await? {
            outcome = outcome.merge(ValidationOutcome::invalid(vec![ValidationFailure::new(
                "events",
                "rejected by the event store",
            )]));
        }
        Ok(outcome)
    }
}
