//! Integration tests for the command process.
//!
//! A submitted command is modified into events, validated internally or by
//! an external party, published as a committed batch and answered on the
//! response sink. The outbox then delivers the published events.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use user_profile_service::adapters::{
    InMemoryEventLog, InMemoryEventStore, InMemoryResponseCollector, RecordingValidationTrigger,
    ValidationRequest,
};
use user_profile_service::application::{
    CommandHandle, CommandPorts, CommandProcessor, CompositeValidator, OutboxProcessor,
    SagaService,
};
use user_profile_service::config::CommandConfig;
use user_profile_service::domain::command::{
    SubmitCommand, ValidationFailure, ValidationOutcome,
};
use user_profile_service::domain::event_log::{BatchStatus, EventTuple};
use user_profile_service::domain::foundation::{
    CommandIdentifier, DomainError, EventEnvelope, ProcessId,
};
use user_profile_service::ports::{
    CommandModifier, CommandResponse, CommandValidator, EventLogWriter,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Turns "profile.*" commands into one event on the profile stream.
struct ProfileModifier;

#[async_trait]
impl CommandModifier for ProfileModifier {
    async fn modify(&self, command: &SubmitCommand) -> Result<Vec<EventTuple>, DomainError> {
        let profile_id = command.payload["profile_id"].as_str().unwrap_or("unknown");
        Ok(vec![EventTuple::new(
            format!("profile-{}", profile_id),
            EventEnvelope::new(
                format!("{}.v1", command.command),
                profile_id,
                "Profile",
                command.payload.clone(),
            ),
        )])
    }
}

/// Display names must not be blank.
struct DisplayNameRule;

#[async_trait]
impl CommandValidator for DisplayNameRule {
    async fn validate(
        &self,
        command: &SubmitCommand,
        _events: &[EventTuple],
    ) -> Result<ValidationOutcome, DomainError> {
        let blank = command.payload["display_name"]
            .as_str()
            .map_or(true, |name| name.trim().is_empty());
        if blank {
            Ok(ValidationOutcome::invalid(vec![ValidationFailure::new(
                "display_name",
                "must not be blank",
            )]))
        } else {
            Ok(ValidationOutcome::valid())
        }
    }
}

struct Service {
    handle: CommandHandle,
    responses: Arc<InMemoryResponseCollector>,
    trigger: Arc<RecordingValidationTrigger>,
    log: Arc<InMemoryEventLog>,
    store: Arc<InMemoryEventStore>,
    shutdown: CancellationToken,
}

impl Drop for Service {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn service(config: CommandConfig) -> Service {
    let log = Arc::new(InMemoryEventLog::new());
    let store = Arc::new(InMemoryEventStore::new());
    let responses = Arc::new(InMemoryResponseCollector::new());
    let trigger = Arc::new(RecordingValidationTrigger::new());
    let ports = CommandPorts {
        modifier: Arc::new(ProfileModifier),
        validator: Arc::new(CompositeValidator::new(
            Arc::new(DisplayNameRule),
            store.clone(),
        )),
        external_validation: trigger.clone(),
        responses: responses.clone(),
        saga: Arc::new(SagaService::new(log.clone(), store.clone())),
    };
    let (processor, handle) = CommandProcessor::new(ports, config.process_settings());
    let shutdown = CancellationToken::new();
    processor.spawn(shutdown.clone());
    Service {
        handle,
        responses,
        trigger,
        log,
        store,
        shutdown,
    }
}

fn update_profile(id: &str, collecting_id: Uuid, display_name: &str) -> SubmitCommand {
    SubmitCommand::new(
        "profile.update",
        json!({"profile_id": id, "display_name": display_name}),
        CommandIdentifier::new(id, collecting_id).unwrap(),
    )
}

async fn next_request(trigger: &RecordingValidationTrigger, seen: usize) -> ValidationRequest {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let requests = trigger.requests().await;
            if requests.len() > seen {
                return requests[seen].clone();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no external validation request")
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn commands_of_one_collection_are_answered_individually() {
    let s = service(CommandConfig::default());
    let collecting_id = Uuid::new_v4();

    s.handle
        .submit(update_profile("p1", collecting_id, "Ada"))
        .unwrap();
    s.handle
        .submit(update_profile("p2", collecting_id, "  "))
        .unwrap();
    s.handle
        .submit(update_profile("p3", collecting_id, "Grace"))
        .unwrap();

    let responses = s
        .responses
        .wait_for(collecting_id, 3, Duration::from_secs(5))
        .await
        .unwrap();

    let mut outcomes: Vec<_> = responses
        .iter()
        .map(|r| (r.identifier().id.clone(), r.is_success()))
        .collect();
    outcomes.sort();
    assert_eq!(
        outcomes,
        vec![
            ("p1".to_string(), true),
            ("p2".to_string(), false),
            ("p3".to_string(), true)
        ]
    );
    assert_eq!(s.log.batch_count().await, 2);
}

#[tokio::test]
async fn published_command_is_delivered_by_the_outbox() {
    let s = service(CommandConfig::default());
    let collecting_id = Uuid::new_v4();
    s.handle
        .submit(update_profile("p1", collecting_id, "Ada"))
        .unwrap();

    let response = s
        .responses
        .wait_for(collecting_id, 1, Duration::from_secs(5))
        .await
        .unwrap()
        .remove(0);
    let CommandResponse::Success { batch_id, .. } = response else {
        panic!("expected success");
    };

    let processor = OutboxProcessor::new(s.log.clone(), s.store.clone());
    processor
        .check_and_process_events(&CancellationToken::new())
        .await
        .unwrap();

    let delivered = s.store.stream("profile-p1").await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].event_type, "profile.update.v1");
    let batch = s.log.get_batch(batch_id).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Executed);
}

#[tokio::test]
async fn externally_validated_command_publishes_after_approval() {
    let s = service(CommandConfig {
        external_validation: vec!["profile.update".to_string()],
    });
    let collecting_id = Uuid::new_v4();
    let process_id = s
        .handle
        .submit(update_profile("p1", collecting_id, "  "))
        .unwrap();

    let request = next_request(&s.trigger, 0).await;
    assert_eq!(request.process_id, process_id);
    assert_eq!(request.events[0].target_stream, "profile-p1");
    assert_eq!(s.log.batch_count().await, 0);

    // The external party overrides the internal rule for blank names.
    s.handle
        .complete_external_validation(process_id, ValidationOutcome::valid())
        .unwrap();

    let responses = s
        .responses
        .wait_for(collecting_id, 1, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(responses[0].is_success());
    assert_eq!(s.log.batch_count().await, 1);
}

#[tokio::test]
async fn verdict_for_unknown_process_is_ignored() {
    let s = service(CommandConfig::default());
    s.handle
        .complete_external_validation(
            ProcessId::new(),
            ValidationOutcome::valid(),
        )
        .unwrap();

    let collecting_id = Uuid::new_v4();
    s.handle
        .submit(update_profile("p1", collecting_id, "Ada"))
        .unwrap();
    let responses = s
        .responses
        .wait_for(collecting_id, 1, Duration::from_secs(5))
        .await
        .unwrap();

    assert!(responses[0].is_success());
    assert_eq!(s.responses.total().await, 1);
}
