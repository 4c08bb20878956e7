//! FunctionCreatedHandler - Projects `FunctionCreated` events.
//!
//! A function is unique per organization and role.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::support::{attach_tags, publish, rollback, ProjectionError, TagTarget};
use crate::application::locking::CreationLockService;
use crate::application::saga::SagaService;
use crate::domain::foundation::BatchId;
use crate::domain::projection::{
    function_projected, function_uniqueness_key, streams, DuplicatePolicy, Function,
    FunctionCreated,
};
use crate::ports::{FirstLevelProjectionRepository, ProjectionTransaction};

pub struct FunctionCreatedHandler {
    repository: Arc<dyn FirstLevelProjectionRepository>,
    saga: Arc<SagaService>,
    locks: Arc<CreationLockService>,
    duplicates: DuplicatePolicy,
}

impl FunctionCreatedHandler {
    pub fn new(
        repository: Arc<dyn FirstLevelProjectionRepository>,
        saga: Arc<SagaService>,
        locks: Arc<CreationLockService>,
        duplicates: DuplicatePolicy,
    ) -> Self {
        Self {
            repository,
            saga,
            locks,
            duplicates,
        }
    }

    /// Project one function creation.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the organization/role pair is taken and
    ///   duplicates are rejected
    /// - `Lock` if `cancel` fires while waiting for the creation lock
    /// - `Unpublished` if the function was stored but its batch could not
    ///   be executed
    #[instrument(skip_all, fields(function_id = %event.function_id))]
    pub async fn handle(
        &self,
        event: &FunctionCreated,
        cancel: &CancellationToken,
    ) -> Result<Function, ProjectionError> {
        let key = function_uniqueness_key(&event.organization_id, &event.role_id);
        let _lock = self.locks.acquire(&key, cancel).await?;

        let tx = self.repository.start_transaction().await?;
        let (function, batch_id) = match self.prepare(event, &key, &tx).await {
            Ok(prepared) => prepared,
            Err(e) => {
                rollback(self.repository.as_ref(), &self.saga, tx, None).await;
                return Err(e);
            }
        };

        if let Err(e) = self.persist(event, &function, batch_id, &tx).await {
            rollback(self.repository.as_ref(), &self.saga, tx, Some(batch_id)).await;
            return Err(e);
        }

        if let Err(e) = self.repository.commit_transaction(tx).await {
            rollback(self.repository.as_ref(), &self.saga, tx, Some(batch_id)).await;
            return Err(e.into());
        }
        publish(&self.saga, batch_id).await?;

        info!(batch_id = %batch_id, key = %key, "Function projected");
        Ok(function)
    }

    async fn prepare(
        &self,
        event: &FunctionCreated,
        key: &str,
        tx: &ProjectionTransaction,
    ) -> Result<(Function, BatchId), ProjectionError> {
        let exists = self
            .repository
            .function_exists(&event.organization_id, &event.role_id, tx)
            .await?;
        if exists {
            if !self.duplicates.allows_duplicates() {
                return Err(ProjectionError::AlreadyExists {
                    entity: "Function",
                    key: key.to_string(),
                });
            }
            warn!(key, "Function already exists, creating duplicate");
        }

        let function = Function::new(
            event.function_id.clone(),
            event.organization_id.clone(),
            event.role_id.clone(),
            event.name.clone(),
        )?;
        let batch_id = self
            .saga
            .create_batch_with_events(function_projected(&function, &event.event_id))
            .await?;
        Ok((function, batch_id))
    }

    async fn persist(
        &self,
        event: &FunctionCreated,
        function: &Function,
        batch_id: BatchId,
        tx: &ProjectionTransaction,
    ) -> Result<(), ProjectionError> {
        self.repository.create_function(function, tx).await?;
        attach_tags(
            self.repository.as_ref(),
            &self.saga,
            batch_id,
            TagTarget {
                stream: streams::function(&function.id),
                entity_id: &function.id,
                aggregate_type: "Function",
            },
            &event.tags,
            &event.event_id,
            tx,
        )
        .await
    }
}
