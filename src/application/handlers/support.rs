//! Pieces shared by the projection handlers.

use std::time::Duration;

use thiserror::Error;
use tracing::{error, warn};

use crate::application::locking::LockError;
use crate::application::saga::{SagaError, SagaService};
use crate::domain::foundation::{BatchId, DomainError, ErrorCode, EventId, ValidationError};
use crate::domain::projection::{tag_created, tags_added, Tag, TagAssignment};
use crate::ports::{FirstLevelProjectionRepository, ProjectionTransaction};

/// Errors raised while projecting a creation event.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Saga(#[from] SagaError),

    /// The projection is committed but its batch could not be executed.
    /// Executing `batch_id` again publishes the events.
    #[error("Projection committed but batch {batch_id} was not executed: {source}")]
    Unpublished {
        batch_id: BatchId,
        #[source]
        source: SagaError,
    },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Infrastructure(#[from] DomainError),
}

impl ProjectionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProjectionError::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            ProjectionError::Invalid(_) => ErrorCode::ValidationFailed,
            ProjectionError::Saga(e) => e.code(),
            ProjectionError::Unpublished { source, .. } => source.code(),
            ProjectionError::Lock(e) => e.code(),
            ProjectionError::Infrastructure(e) => e.code,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ProjectionError::AlreadyExists { .. })
    }
}

const PUBLISH_ATTEMPTS: u32 = 3;
const PUBLISH_BACKOFF: Duration = Duration::from_millis(20);

/// Execute the batch of an already committed projection.
///
/// The projection cannot be rolled back any more, so infrastructure failures
/// are retried. If every attempt fails the batch stays `Initialized` and its
/// id is returned in `Unpublished`.
pub(super) async fn publish(saga: &SagaService, batch_id: BatchId) -> Result<(), ProjectionError> {
    let mut attempt = 1;
    loop {
        match saga.execute_batch(batch_id).await {
            Ok(()) => return Ok(()),
            Err(e @ SagaError::Infrastructure(_)) if attempt < PUBLISH_ATTEMPTS => {
                warn!(batch_id = %batch_id, attempt, error = %e, "Failed to execute batch, retrying");
                tokio::time::sleep(PUBLISH_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                error!(
                    batch_id = %batch_id,
                    attempts = attempt,
                    error = %e,
                    "Projection committed but its batch was not executed"
                );
                return Err(ProjectionError::Unpublished {
                    batch_id,
                    source: e,
                });
            }
        }
    }
}

/// Where the tag-assignment event of an entity goes.
pub(super) struct TagTarget<'a> {
    pub stream: String,
    pub entity_id: &'a str,
    pub aggregate_type: &'a str,
}

/// Create missing tags, assign all of them to the entity and stage the
/// matching events in `batch_id`.
pub(super) async fn attach_tags(
    repo: &dyn FirstLevelProjectionRepository,
    saga: &SagaService,
    batch_id: BatchId,
    target: TagTarget<'_>,
    tags: &[TagAssignment],
    cause: &EventId,
    tx: &ProjectionTransaction,
) -> Result<(), ProjectionError> {
    if tags.is_empty() {
        return Ok(());
    }

    let mut events = Vec::new();
    for assignment in tags {
        if repo.get_tag(&assignment.tag_id, tx).await?.is_none() {
            let tag = Tag {
                id: assignment.tag_id.clone(),
                name: assignment.name.clone(),
            };
            repo.create_tag(&tag, tx).await?;
            events.push(tag_created(&tag, cause));
        }
    }

    repo.add_tags(target.entity_id, tags, tx).await?;
    events.push(tags_added(
        &target.stream,
        target.entity_id,
        target.aggregate_type,
        tags,
        cause,
    ));
    saga.add_events(batch_id, events).await?;
    Ok(())
}

/// Undo a partially applied projection. Failures are logged, not returned,
/// so the original error reaches the caller.
pub(super) async fn rollback(
    repo: &dyn FirstLevelProjectionRepository,
    saga: &SagaService,
    tx: ProjectionTransaction,
    batch_id: Option<BatchId>,
) {
    if let Err(e) = repo.abort_transaction(tx).await {
        warn!(transaction = %tx.id, error = %e, "Failed to abort projection transaction");
    }
    if let Some(batch_id) = batch_id {
        if let Err(e) = saga.abort_batch(batch_id).await {
            warn!(batch_id = %batch_id, error = %e, "Failed to abort batch");
        }
    }
}
