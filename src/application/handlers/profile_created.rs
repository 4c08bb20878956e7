//! ProfileCreatedHandler - Projects `UserCreated` events.
//!
//! A user is unique per external id, display name and email.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::support::{attach_tags, publish, rollback, ProjectionError, TagTarget};
use crate::application::locking::CreationLockService;
use crate::application::saga::SagaService;
use crate::domain::foundation::BatchId;
use crate::domain::projection::{
    profile_projected, streams, user_uniqueness_key, DuplicatePolicy, Profile, UserCreated,
};
use crate::ports::{FirstLevelProjectionRepository, ProjectionTransaction};

pub struct ProfileCreatedHandler {
    repository: Arc<dyn FirstLevelProjectionRepository>,
    saga: Arc<SagaService>,
    locks: Arc<CreationLockService>,
    duplicates: DuplicatePolicy,
}

impl ProfileCreatedHandler {
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

    #[instrument(skip_all, fields(profile_id = %event.profile_id))]
    pub async fn handle(
        &self,
        event: &UserCreated,
        cancel: &CancellationToken,
    ) -> Result<Profile, ProjectionError> {
        let key = user_uniqueness_key(
            event.external_id.as_deref(),
            &event.display_name,
            event.email.as_deref(),
        );
        let _lock = self.locks.acquire(&key, cancel).await?;

        let tx = self.repository.start_transaction().await?;
        let (profile, batch_id) = match self.prepare(event, &key, &tx).await {
            Ok(prepared) => prepared,
            Err(e) => {
                rollback(self.repository.as_ref(), &self.saga, tx, None).await;
                return Err(e);
            }
        };

        if let Err(e) = self.persist(event, &profile, batch_id, &tx).await {
            rollback(self.repository.as_ref(), &self.saga, tx, Some(batch_id)).await;
            return Err(e);
        }

        if let Err(e) = self.repository.commit_transaction(tx).await {
            rollback(self.repository.as_ref(), &self.saga, tx, Some(batch_id)).await;
            return Err(e.into());
        }
        publish(&self.saga, batch_id).await?;

        info!(batch_id = %batch_id, "Profile projected");
        Ok(profile)
    }

    async fn prepare(
        &self,
        event: &UserCreated,
        key: &str,
        tx: &ProjectionTransaction,
    ) -> Result<(Profile, BatchId), ProjectionError> {
        let exists = self
            .repository
            .user_exists(
                event.external_id.as_deref(),
                &event.display_name,
                event.email.as_deref(),
                tx,
            )
            .await?;
        if exists {
            if !self.duplicates.allows_duplicates() {
                return Err(ProjectionError::AlreadyExists {
                    entity: "User",
                    key: key.to_string(),
                });
            }
            warn!(key, "User already exists, creating duplicate");
        }

        let profile = Profile::new(
            event.profile_id.clone(),
            event.external_id.clone(),
            event.display_name.clone(),
            event.email.clone(),
        )?;
        let batch_id = self
            .saga
            .create_batch_with_events(profile_projected(&profile, &event.event_id))
            .await?;
        Ok((profile, batch_id))
    }

    async fn persist(
        &self,
        event: &UserCreated,
        profile: &Profile,
        batch_id: BatchId,
        tx: &ProjectionTransaction,
    ) -> Result<(), ProjectionError> {
        self.repository.create_profile(profile, tx).await?;
        attach_tags(
            self.repository.as_ref(),
            &self.saga,
            batch_id,
            TagTarget {
                stream: streams::profile(&profile.id),
                entity_id: &profile.id,
                aggregate_type: "Profile",
            },
            &event.tags,
            &event.event_id,
            tx,
        )
        .await
    }
}
