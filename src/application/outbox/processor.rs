//! OutboxProcessor - Drains committed batches into the event store.
//!
//! This is the delivery half of the Transactional Outbox Pattern:
//! 1. The saga service stages events in a batch and commits it
//! 2. **The processor writes each event to its stream** ← This module
//! 3. Per-event and per-batch status in the event log records progress
//!
//! ## Guarantees
//!
//! - At-least-once: an event is marked executed only after the store
//!   acknowledged it, so a crash in between causes a redelivery
//! - Idempotent per event: processed events are skipped on every later pass
//! - Single flight: one cycle at a time per processor; concurrent callers
//!   wait for the running cycle
//!
//! ## Failures
//!
//! A failed write is retried up to `RetryPolicy::attempts` times, then
//! recorded on the event and skipped. The batch still reaches `Executed`.
//! `redrive_batch` re-attempts whatever was left behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::report::{BatchReport, DrainReport, FailedEvent};
use crate::config::OutboxConfig;
use crate::domain::event_log::{BatchStatus, EventBatch, EventLogTuple};
use crate::domain::foundation::{BatchId, DomainError, ErrorCode};
use crate::ports::{EventLogWriter, EventStorageClient, WriteEventResult};

/// How often a single event is tried within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// One attempt, no waiting.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&OutboxConfig::default())
    }
}

impl From<&OutboxConfig> for RetryPolicy {
    fn from(config: &OutboxConfig) -> Self {
        Self {
            attempts: config.write_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }
}

enum EventOutcome {
    Written(WriteEventResult),
    Failed,
    Cancelled,
}

/// Moves committed batches from the event log to the event store.
pub struct OutboxProcessor {
    event_log: Arc<dyn EventLogWriter>,
    event_store: Arc<dyn EventStorageClient>,
    retry: RetryPolicy,
    single_flight: Semaphore,
}

impl OutboxProcessor {
    pub fn new(event_log: Arc<dyn EventLogWriter>, event_store: Arc<dyn EventStorageClient>) -> Self {
        Self {
            event_log,
            event_store,
            retry: RetryPolicy::default(),
            single_flight: Semaphore::new(1),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run one drain cycle.
    ///
    /// Processes batches until none is pending or `cancel` fires. A batch
    /// interrupted by cancellation stays `Processing` and is resumed by the
    /// next cycle.
    ///
    /// # Errors
    ///
    /// Returns an error only when the event log itself fails. Event store
    /// failures are reported in the returned `DrainReport`.
    pub async fn check_and_process_events(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DrainReport, DomainError> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.single_flight.acquire() => Some(permit),
        };
        let _permit = match permit {
            Some(permit) => permit.map_err(|_| lock_closed())?,
            None => {
                info!("Drain cycle cancelled before start");
                return Ok(DrainReport::cancelled_before_start());
            }
        };

        let mut report = DrainReport::default();
        loop {
            if cancel.is_cancelled() {
                info!(batches = report.batches.len(), "Drain cycle cancelled");
                report.cancelled = true;
                break;
            }

            let Some(batch) = self.event_log.try_get_next_committed_batch().await? else {
                break;
            };

            let batch_report = self.drain_batch(batch, cancel).await?;
            let interrupted = !batch_report.completed;
            report.batches.push(batch_report);
            if interrupted {
                report.cancelled = true;
                break;
            }
        }

        Ok(report)
    }

    /// Re-attempt the unprocessed events of an executed batch.
    ///
    /// Runs under the same single-flight lock as the drain cycle. The batch
    /// keeps its `Executed` status.
    ///
    /// # Errors
    ///
    /// - `BatchNotFound` if the batch does not exist
    /// - `InvalidStateTransition` if the batch is not `Executed`
    pub async fn redrive_batch(
        &self,
        batch_id: BatchId,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, DomainError> {
        let _permit = self.single_flight.acquire().await.map_err(|_| lock_closed())?;

        let batch = self.event_log.get_batch(batch_id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::BatchNotFound,
                format!("Batch not found: {}", batch_id),
            )
        })?;
        if batch.status != BatchStatus::Executed {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Only executed batches can be redriven, batch is {}", batch.status),
            )
            .with_detail("batch_id", batch_id.to_string()));
        }

        info!(batch_id = %batch_id, "Redriving batch");
        self.write_pending(batch_id, cancel).await
    }

    async fn drain_batch(
        &self,
        mut batch: EventBatch,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, DomainError> {
        if batch.status == BatchStatus::Processing {
            info!(batch_id = %batch.id, "Resuming interrupted batch");
        } else {
            batch.transition_to(BatchStatus::Processing)?;
            self.event_log
                .update_batch(&batch, BatchStatus::Committed)
                .await?;
            debug!(batch_id = %batch.id, "Batch processing");
        }

        let report = self.write_pending(batch.id, cancel).await?;
        if !report.completed {
            warn!(batch_id = %batch.id, "Batch interrupted, will resume next cycle");
            return Ok(report);
        }

        batch.transition_to(BatchStatus::Executed)?;
        self.event_log
            .update_batch(&batch, BatchStatus::Processing)
            .await?;

        info!(
            batch_id = %batch.id,
            executed = report.executed,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Batch executed"
        );
        Ok(report)
    }

    /// Write every unprocessed event of a batch in insertion order.
    ///
    /// The report is `completed` unless cancellation stopped the pass early.
    async fn write_pending(
        &self,
        batch_id: BatchId,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, DomainError> {
        let mut report = BatchReport::new(batch_id);

        for mut event in self.event_log.get_events(batch_id).await? {
            if event.status.is_processed() {
                report.skipped += 1;
                continue;
            }
            if cancel.is_cancelled() {
                return Ok(report);
            }

            match self.write_with_retry(&mut event, cancel).await {
                EventOutcome::Written(result) => {
                    event.mark_executed();
                    self.event_log.update_event(&event).await?;
                    debug!(
                        batch_id = %batch_id,
                        event_id = %event.event.event_id,
                        stream = %result.stream,
                        position = result.stream_position,
                        "Event written"
                    );
                    report.executed += 1;
                }
                EventOutcome::Failed => {
                    self.event_log.update_event(&event).await?;
                    report.failed.push(FailedEvent::from(&event));
                }
                EventOutcome::Cancelled => {
                    self.event_log.update_event(&event).await?;
                    return Ok(report);
                }
            }
        }

        report.completed = true;
        Ok(report)
    }

    async fn write_with_retry(
        &self,
        event: &mut EventLogTuple,
        cancel: &CancellationToken,
    ) -> EventOutcome {
        for attempt in 1..=self.retry.attempts {
            match self
                .event_store
                .write_event(&event.event, &event.target_stream)
                .await
            {
                Ok(result) => return EventOutcome::Written(result),
                Err(e) => {
                    warn!(
                        batch_id = %event.batch_id,
                        event_id = %event.event.event_id,
                        stream = %event.target_stream,
                        attempt,
                        error = %e,
                        "Failed to write event"
                    );
                    event.record_failure(e.to_string());
                }
            }

            if attempt < self.retry.attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return EventOutcome::Cancelled,
                    _ = tokio::time::sleep(self.retry.backoff) => {}
                }
            }
        }
        EventOutcome::Failed
    }
}

fn lock_closed() -> DomainError {
    DomainError::new(ErrorCode::InternalError, "Outbox single-flight lock closed")
}
