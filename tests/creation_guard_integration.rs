//! Integration tests for duplicate-safe creation in the first-level projection.
//!
//! Concurrent creation events with the same uniqueness key must yield
//! exactly one entity; the losers fail with `AlreadyExists` and leave no
//! batch or open transaction behind.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use user_profile_service::adapters::{
    InMemoryEventLog, InMemoryEventStore, InMemoryProjectionRepository,
};
use user_profile_service::application::{
    CreationLockService, FunctionCreatedHandler, LockError, OutboxProcessor, ProjectionError,
    SagaService,
};
use user_profile_service::config::ProjectionConfig;
use user_profile_service::domain::foundation::{EventId, Timestamp};
use user_profile_service::domain::projection::{function_uniqueness_key, FunctionCreated};

struct Projection {
    repo: Arc<InMemoryProjectionRepository>,
    log: Arc<InMemoryEventLog>,
    store: Arc<InMemoryEventStore>,
    locks: Arc<CreationLockService>,
    handler: Arc<FunctionCreatedHandler>,
}

fn projection() -> Projection {
    let repo = Arc::new(InMemoryProjectionRepository::new());
    let log = Arc::new(InMemoryEventLog::new());
    let store = Arc::new(InMemoryEventStore::new());
    let locks = Arc::new(CreationLockService::new());
    let saga = Arc::new(SagaService::new(log.clone(), store.clone()));
    let handler = Arc::new(FunctionCreatedHandler::new(
        repo.clone(),
        saga,
        locks.clone(),
        ProjectionConfig::default().functions,
    ));
    Projection {
        repo,
        log,
        store,
        locks,
        handler,
    }
}

fn function_created(function_id: &str, organization_id: &str, role_id: &str) -> FunctionCreated {
    FunctionCreated {
        event_id: EventId::new(),
        function_id: function_id.to_string(),
        organization_id: organization_id.to_string(),
        role_id: role_id.to_string(),
        name: format!("{} {}", organization_id, role_id),
        tags: vec![],
        created_at: Timestamp::now(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_create_one_function() {
    let p = projection();
    let cancel = CancellationToken::new();

    let attempts = ["f1", "f2"].map(|id| {
        let handler = p.handler.clone();
        let cancel = cancel.clone();
        let event = function_created(id, "O1", "R1");
        tokio::spawn(async move { handler.handle(&event, &cancel).await })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let created = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_already_exists()))
        .count();
    assert_eq!((created, rejected), (1, 1));
    assert_eq!(p.repo.create_function_calls(), 1);
    assert_eq!(p.log.batch_count().await, 1);
    assert_eq!(p.repo.open_transactions().await, 0);
    assert_eq!(p.locks.active_keys(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_keys_do_not_block_each_other() {
    let p = projection();
    let cancel = CancellationToken::new();

    let attempts = [("f1", "R1"), ("f2", "R2"), ("f3", "R3")].map(|(id, role)| {
        let handler = p.handler.clone();
        let cancel = cancel.clone();
        let event = function_created(id, "O1", role);
        tokio::spawn(async move { handler.handle(&event, &cancel).await })
    });
    for result in futures::future::join_all(attempts).await {
        result.unwrap().unwrap();
    }

    assert_eq!(p.repo.functions().await.len(), 3);
}

#[tokio::test]
async fn waiting_creation_can_be_cancelled() {
    let p = projection();
    let holder = p
        .locks
        .acquire(
            &function_uniqueness_key("O1", "R1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let waiting = {
        let handler = p.handler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            handler
                .handle(&function_created("f1", "O1", "R1"), &cancel)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .expect("cancellation did not wake the waiter")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ProjectionError::Lock(LockError::Cancelled { .. })));
    assert_eq!(p.repo.create_function_calls(), 0);

    drop(holder);
    assert_eq!(p.locks.active_keys(), 0);
}

#[tokio::test]
async fn projected_function_reaches_event_store() {
    let p = projection();
    p.handler
        .handle(&function_created("f1", "O1", "R1"), &CancellationToken::new())
        .await
        .unwrap();

    let processor = OutboxProcessor::new(p.log.clone(), p.store.clone());
    let report = processor
        .check_and_process_events(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.executed_events(), 3);
    let mut streams = p.store.written_streams().await;
    streams.sort();
    assert_eq!(streams, vec!["function-f1", "organization-O1", "role-R1"]);
}
