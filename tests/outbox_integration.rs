//! Integration tests for the transactional outbox.
//!
//! These tests verify the end-to-end flow:
//! 1. The saga service stages events in a batch and commits it
//! 2. The outbox processor drains committed batches into the event store
//! 3. Delivered events are marked executed and never written twice
//! 4. Failed events stay in the log for a redrive
//!
//! Uses in-memory implementations to test the pattern without external dependencies.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use user_profile_service::adapters::{InMemoryEventLog, InMemoryEventStore};
use user_profile_service::application::{
    OutboxProcessor, OutboxWorker, RetryPolicy, SagaError, SagaService,
};
use user_profile_service::config::OutboxConfig;
use user_profile_service::domain::event_log::{BatchStatus, EventStatus, EventTuple};
use user_profile_service::domain::foundation::{DomainError, EventEnvelope};
use user_profile_service::ports::{EventLogWriter, EventStorageClient, WriteEventResult};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Outbox {
    log: Arc<InMemoryEventLog>,
    store: Arc<InMemoryEventStore>,
    saga: SagaService,
    processor: OutboxProcessor,
}

fn outbox() -> Outbox {
    let log = Arc::new(InMemoryEventLog::new());
    let store = Arc::new(InMemoryEventStore::new());
    Outbox {
        saga: SagaService::new(log.clone(), store.clone()),
        processor: OutboxProcessor::new(log.clone(), store.clone())
            .with_retry_policy(RetryPolicy::none()),
        log,
        store,
    }
}

fn tuple(stream: &str, event_type: &str) -> EventTuple {
    EventTuple::new(
        stream,
        EventEnvelope::new(event_type, "p-1", "Profile", json!({"name": event_type})),
    )
}

/// Event store that records how many writers overlap.
struct SlowStore {
    inner: InMemoryEventStore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowStore {
    fn new() -> Self {
        Self {
            inner: InMemoryEventStore::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EventStorageClient for SlowStore {
    async fn write_event(
        &self,
        event: &EventEnvelope,
        stream: &str,
    ) -> Result<WriteEventResult, DomainError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = self.inner.write_event(event, stream).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn validate_events(&self, events: &[EventEnvelope]) -> Result<bool, DomainError> {
        self.inner.validate_events(events).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn committed_batch_is_delivered_in_order() {
    let o = outbox();
    let batch_id = o
        .saga
        .create_batch_with_events(vec![
            tuple("profile-1", "e1.v1"),
            tuple("profile-1", "e2.v1"),
            tuple("profile-2", "e3.v1"),
        ])
        .await
        .unwrap();
    o.saga.execute_batch(batch_id).await.unwrap();

    let report = o
        .processor
        .check_and_process_events(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.executed_events(), 3);
    let first: Vec<_> = o
        .store
        .stream("profile-1")
        .await
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(first, vec!["e1.v1", "e2.v1"]);
    assert_eq!(o.store.stream("profile-2").await.len(), 1);
    assert_eq!(
        o.log.status_history(batch_id).await,
        vec![
            BatchStatus::Initialized,
            BatchStatus::Committed,
            BatchStatus::Processing,
            BatchStatus::Executed
        ]
    );
}

#[tokio::test]
async fn second_cycle_writes_nothing() {
    let o = outbox();
    let batch_id = o
        .saga
        .create_batch_with_events(vec![tuple("profile-1", "e1.v1")])
        .await
        .unwrap();
    o.saga.execute_batch(batch_id).await.unwrap();
    let cancel = CancellationToken::new();

    o.processor.check_and_process_events(&cancel).await.unwrap();
    let second = o.processor.check_and_process_events(&cancel).await.unwrap();

    assert!(second.is_idle());
    assert_eq!(o.store.write_count().await, 1);
}

#[tokio::test]
async fn uncommitted_batches_are_not_delivered() {
    let o = outbox();
    o.saga
        .create_batch_with_events(vec![tuple("profile-1", "e1.v1")])
        .await
        .unwrap();
    let aborted = o
        .saga
        .create_batch_with_events(vec![tuple("profile-2", "e2.v1")])
        .await
        .unwrap();
    o.saga.abort_batch(aborted).await.unwrap();

    let report = o
        .processor
        .check_and_process_events(&CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_idle());
    assert_eq!(o.store.write_count().await, 0);
}

#[tokio::test]
async fn failed_event_stays_pending_until_redrive() {
    let o = outbox();
    o.store.fail_writes_to("profile-2").await;
    let batch_id = o
        .saga
        .create_batch_with_events(vec![
            tuple("profile-1", "e1.v1"),
            tuple("profile-2", "e2.v1"),
            tuple("profile-1", "e3.v1"),
        ])
        .await
        .unwrap();
    o.saga.execute_batch(batch_id).await.unwrap();
    let cancel = CancellationToken::new();

    let report = o.processor.check_and_process_events(&cancel).await.unwrap();

    assert_eq!(report.executed_events(), 2);
    let failed: Vec<_> = report.retryable_events().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].target_stream, "profile-2");
    assert_eq!(
        o.saga.get_batch(batch_id).await.unwrap().status,
        BatchStatus::Executed
    );

    o.store.heal("profile-2").await;
    let redriven = o.processor.redrive_batch(batch_id, &cancel).await.unwrap();

    assert_eq!(redriven.executed, 1);
    assert!(redriven.is_clean());
    let statuses: Vec<_> = o
        .log
        .get_events(batch_id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.status)
        .collect();
    assert_eq!(statuses, vec![EventStatus::Executed; 3]);
    assert_eq!(o.store.write_count().await, 3);
}

#[tokio::test]
async fn executed_batch_cannot_be_committed_again() {
    let o = outbox();
    let batch_id = o
        .saga
        .create_batch_with_events(vec![tuple("profile-1", "e1.v1")])
        .await
        .unwrap();
    o.saga.execute_batch(batch_id).await.unwrap();
    o.processor
        .check_and_process_events(&CancellationToken::new())
        .await
        .unwrap();

    let err = o.saga.execute_batch(batch_id).await.unwrap_err();

    assert!(matches!(err, SagaError::InvalidBatchState { .. }));
    assert_eq!(o.store.write_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cycles_never_overlap() {
    let log = Arc::new(InMemoryEventLog::new());
    let store = Arc::new(SlowStore::new());
    let saga = SagaService::new(log.clone(), store.clone());
    let processor = Arc::new(OutboxProcessor::new(log.clone(), store.clone()));

    for i in 0..4 {
        let batch_id = saga
            .create_batch_with_events(vec![
                tuple(&format!("profile-{}", i), "e1.v1"),
                tuple(&format!("profile-{}", i), "e2.v1"),
            ])
            .await
            .unwrap();
        saga.execute_batch(batch_id).await.unwrap();
    }

    let cancel = CancellationToken::new();
    let cycles = (0..4).map(|_| {
        let processor = processor.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { processor.check_and_process_events(&cancel).await })
    });
    let reports = futures::future::join_all(cycles).await;

    let executed: usize = reports
        .into_iter()
        .map(|r| r.unwrap().unwrap().executed_events())
        .sum();
    assert_eq!(executed, 8);
    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner.write_count().await, 8);
}

#[tokio::test]
async fn worker_delivers_batches_committed_while_running() {
    let o = outbox();
    let processor = Arc::new(o.processor);
    let config = OutboxConfig::default().with_poll_interval(Duration::from_millis(10));
    let (_config_tx, config_rx) = watch::channel(config);
    let shutdown = CancellationToken::new();
    let worker = OutboxWorker::new(processor, config_rx).spawn(shutdown.clone());

    let batch_id = o
        .saga
        .create_batch_with_events(vec![tuple("profile-1", "e1.v1")])
        .await
        .unwrap();
    o.saga.execute_batch(batch_id).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while o.saga.get_batch(batch_id).await.unwrap().status != BatchStatus::Executed {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("batch was not drained");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker did not stop")
        .unwrap();
    assert_eq!(o.store.write_count().await, 1);
}
