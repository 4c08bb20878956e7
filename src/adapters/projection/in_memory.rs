//! In-memory first-level projection repository.
//!
//! Each transaction stages its writes separately. Reads inside a
//! transaction see committed data plus the transaction's own writes;
//! other transactions see the writes only after commit.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::projection::{
    function_uniqueness_key, user_uniqueness_key, Function, Profile, Tag, TagAssignment,
};
use crate::ports::{FirstLevelProjectionRepository, ProjectionTransaction};

#[derive(Default, Clone)]
struct Snapshot {
    profiles: Vec<Profile>,
    functions: Vec<Function>,
    tags: HashMap<String, Tag>,
    assignments: HashMap<String, Vec<TagAssignment>>,
}

impl Snapshot {
    fn merge(&mut self, staged: Snapshot) {
        self.profiles.extend(staged.profiles);
        self.functions.extend(staged.functions);
        self.tags.extend(staged.tags);
        for (entity_id, tags) in staged.assignments {
            self.assignments.entry(entity_id).or_default().extend(tags);
        }
    }

    fn has_user(&self, key: &str) -> bool {
        self.profiles.iter().any(|p| p.uniqueness_key() == key)
    }

    fn has_function(&self, key: &str) -> bool {
        self.functions.iter().any(|f| f.uniqueness_key() == key)
    }
}

#[derive(Default)]
struct RepoState {
    committed: Snapshot,
    open: HashMap<Uuid, Snapshot>,
}

impl RepoState {
    fn staged(&mut self, tx: &ProjectionTransaction) -> Result<&mut Snapshot, DomainError> {
        self.open.get_mut(&tx.id).ok_or_else(|| unknown_transaction(tx))
    }

    fn visible<T>(
        &self,
        tx: &ProjectionTransaction,
        check: impl Fn(&Snapshot) -> T,
        combine: impl Fn(T, T) -> T,
    ) -> Result<T, DomainError> {
        let staged = self.open.get(&tx.id).ok_or_else(|| unknown_transaction(tx))?;
        Ok(combine(check(&self.committed), check(staged)))
    }
}

/// First-level projection store kept in process memory.
#[derive(Default)]
pub struct InMemoryProjectionRepository {
    state: Mutex<RepoState>,
    create_function_calls: AtomicUsize,
    create_profile_calls: AtomicUsize,
}

impl InMemoryProjectionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Number of `create_function` calls, committed or not.
    pub fn create_function_calls(&self) -> usize {
        self.create_function_calls.load(Ordering::SeqCst)
    }

    pub fn create_profile_calls(&self) -> usize {
        self.create_profile_calls.load(Ordering::SeqCst)
    }

    pub async fn functions(&self) -> Vec<Function> {
        self.state.lock().await.committed.functions.clone()
    }

    pub async fn profiles(&self) -> Vec<Profile> {
        self.state.lock().await.committed.profiles.clone()
    }

    pub async fn tags_of(&self, entity_id: &str) -> Vec<TagAssignment> {
        self.state
            .lock()
            .await
            .committed
            .assignments
            .get(entity_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn open_transactions(&self) -> usize {
        self.state.lock().await.open.len()
    }
}

#[async_trait]
impl FirstLevelProjectionRepository for InMemoryProjectionRepository {
    async fn start_transaction(&self) -> Result<ProjectionTransaction, DomainError> {
        let tx = ProjectionTransaction::new();
        self.state.lock().await.open.insert(tx.id, Snapshot::default());
        Ok(tx)
    }

    async fn commit_transaction(&self, tx: ProjectionTransaction) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        let staged = state.open.remove(&tx.id).ok_or_else(|| unknown_transaction(&tx))?;
        state.committed.merge(staged);
        Ok(())
    }

    async fn abort_transaction(&self, tx: ProjectionTransaction) -> Result<(), DomainError> {
        self.state
            .lock()
            .await
            .open
            .remove(&tx.id)
            .map(|_| ())
            .ok_or_else(|| unknown_transaction(&tx))
    }

    async fn user_exists(
        &self,
        external_id: Option<&str>,
        display_name: &str,
        email: Option<&str>,
        tx: &ProjectionTransaction,
    ) -> Result<bool, DomainError> {
        let key = user_uniqueness_key(external_id, display_name, email);
        self.state
            .lock()
            .await
            .visible(tx, |s| s.has_user(&key), |a, b| a || b)
    }

    async fn function_exists(
        &self,
        organization_id: &str,
        role_id: &str,
        tx: &ProjectionTransaction,
    ) -> Result<bool, DomainError> {
        let key = function_uniqueness_key(organization_id, role_id);
        self.state
            .lock()
            .await
            .visible(tx, |s| s.has_function(&key), |a, b| a || b)
    }

    async fn create_profile(
        &self,
        profile: &Profile,
        tx: &ProjectionTransaction,
    ) -> Result<(), DomainError> {
        self.create_profile_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        state.staged(tx)?.profiles.push(profile.clone());
        Ok(())
    }

    async fn create_function(
        &self,
        function: &Function,
        tx: &ProjectionTransaction,
    ) -> Result<(), DomainError> {
        self.create_function_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        state.staged(tx)?.functions.push(function.clone());
        Ok(())
    }

    async fn get_tag(
        &self,
        tag_id: &str,
        tx: &ProjectionTransaction,
    ) -> Result<Option<Tag>, DomainError> {
        self.state.lock().await.visible(
            tx,
            |s| s.tags.get(tag_id).cloned(),
            |committed, staged| committed.or(staged),
        )
    }

    async fn create_tag(&self, tag: &Tag, tx: &ProjectionTransaction) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.staged(tx)?.tags.insert(tag.id.clone(), tag.clone());
        Ok(())
    }

    async fn add_tags(
        &self,
        entity_id: &str,
        tags: &[TagAssignment],
        tx: &ProjectionTransaction,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state
            .staged(tx)?
            .assignments
            .entry(entity_id.to_string())
            .or_default()
            .extend_from_slice(tags);
        Ok(())
    }
}

fn unknown_transaction(tx: &ProjectionTransaction) -> DomainError {
    DomainError::new(
        ErrorCode::InternalError,
        format!("Unknown projection transaction: {}", tx.id),
    )
}
