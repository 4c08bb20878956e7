//! FirstLevelProjectionRepository port - Storage of the first-level projection.
//!
//! Every read and write happens inside a `ProjectionTransaction` obtained from
//! `start_transaction`. Writes become visible to other transactions only after
//! `commit_transaction`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::foundation::DomainError;
use crate::domain::projection::{Function, Profile, Tag, TagAssignment};

/// Handle of an open projection transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectionTransaction {
    pub id: Uuid,
}

impl ProjectionTransaction {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for ProjectionTransaction {
    fn default() -> Self {
        Self::new()
    }
}

/// Port for the first-level projection store.
#[async_trait]
pub trait FirstLevelProjectionRepository: Send + Sync {
    async fn start_transaction(&self) -> Result<ProjectionTransaction, DomainError>;

    async fn commit_transaction(&self, tx: ProjectionTransaction) -> Result<(), DomainError>;

    async fn abort_transaction(&self, tx: ProjectionTransaction) -> Result<(), DomainError>;

    /// True if a user with the same uniqueness key exists.
    async fn user_exists(
        &self,
        external_id: Option<&str>,
        display_name: &str,
        email: Option<&str>,
        tx: &ProjectionTransaction,
    ) -> Result<bool, DomainError>;

    /// True if a function for the organization/role pair exists.
    async fn function_exists(
        &self,
        organization_id: &str,
        role_id: &str,
        tx: &ProjectionTransaction,
    ) -> Result<bool, DomainError>;

    async fn create_profile(
        &self,
        profile: &Profile,
        tx: &ProjectionTransaction,
    ) -> Result<(), DomainError>;

    async fn create_function(
        &self,
        function: &Function,
        tx: &ProjectionTransaction,
    ) -> Result<(), DomainError>;

    async fn get_tag(
        &self,
        tag_id: &str,
        tx: &ProjectionTransaction,
    ) -> Result<Option<Tag>, DomainError>;

    async fn create_tag(&self, tag: &Tag, tx: &ProjectionTransaction) -> Result<(), DomainError>;

    /// Attach tags to the profile or function with `entity_id`.
    async fn add_tags(
        &self,
        entity_id: &str,
        tags: &[TagAssignment],
        tx: &ProjectionTransaction,
    ) -> Result<(), DomainError>;
}
