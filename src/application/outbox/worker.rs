//! OutboxWorker - Periodic driver of the outbox processor.
//!
//! Runs a drain cycle, then sleeps for the configured poll interval. The
//! interval is read from a `watch` channel on every iteration, and a config
//! change cuts the current sleep short.
//!
//! ## Graceful Shutdown
//!
//! The worker derives a child token from the shutdown token it is given.
//! Cancellation reaches the running cycle, which stops before the next
//! event write and leaves its batch to be resumed.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use super::processor::OutboxProcessor;
use super::report::DrainReport;
use crate::config::OutboxConfig;

/// Background service that keeps the outbox drained.
pub struct OutboxWorker {
    processor: Arc<OutboxProcessor>,
    config: watch::Receiver<OutboxConfig>,
}

impl OutboxWorker {
    pub fn new(processor: Arc<OutboxProcessor>, config: watch::Receiver<OutboxConfig>) -> Self {
        Self { processor, config }
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let token = shutdown.child_token();
        let mut reloads_open = true;
        let mut cycle: u64 = 0;

        info!(
            poll_interval_ms = self.config.borrow().poll_interval_ms,
            "Outbox worker started"
        );

        while !token.is_cancelled() {
            cycle += 1;
            let span = info_span!("outbox.drain_cycle", cycle);
            match self
                .processor
                .check_and_process_events(&token)
                .instrument(span)
                .await
            {
                Ok(report) => log_report(cycle, &report),
                Err(e) => error!(cycle, error = %e, "Drain cycle failed"),
            }

            let interval = self.config.borrow_and_update().poll_interval();
            if reloads_open {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                    changed = self.config.changed() => match changed {
                        Ok(()) => info!(
                            poll_interval_ms = self.config.borrow().poll_interval_ms,
                            "Outbox config reloaded"
                        ),
                        Err(_) => reloads_open = false,
                    },
                }
            } else {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        info!(cycles = cycle, "Outbox worker stopped");
    }

    /// Run on a new task.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

fn log_report(cycle: u64, report: &DrainReport) {
    if report.is_idle() && !report.cancelled {
        return;
    }
    let retryable = report.retryable_events().count();
    if retryable > 0 {
        warn!(
            cycle,
            batches = report.batches.len(),
            executed = report.executed_events(),
            retryable,
            "Drain cycle left events behind"
        );
    } else {
        info!(
            cycle,
            batches = report.batches.len(),
            executed = report.executed_events(),
            cancelled = report.cancelled,
            "Drain cycle finished"
        );
    }
}
