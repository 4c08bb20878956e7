//! Per-key creation locks.
//!
//! Two creation events for the same real-world entity can arrive at the same
//! time. Each handler takes the lock for the entity's uniqueness key before
//! its existence check, so the check and the creation happen as one step.
//!
//! Locks are created on first use and dropped from the map once nobody
//! holds or waits for them.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::foundation::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("Cancelled while waiting for creation lock '{key}'")]
    Cancelled { key: String },

    #[error("Creation lock '{key}' was closed")]
    Closed { key: String },
}

impl LockError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LockError::Cancelled { .. } => ErrorCode::Cancelled,
            LockError::Closed { .. } => ErrorCode::InternalError,
        }
    }
}

type LockMap = DashMap<String, Arc<Semaphore>>;

/// Hands out exclusive locks keyed by uniqueness key.
#[derive(Default)]
pub struct CreationLockService {
    locks: Arc<LockMap>,
}

impl CreationLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `key`.
    ///
    /// # Errors
    ///
    /// `LockError::Cancelled` if `cancel` fires first.
    pub async fn acquire(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<CreationLock, LockError> {
        let semaphore = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();

        let acquired = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = semaphore.clone().acquire_owned() => Some(permit),
        };

        match acquired {
            Some(Ok(permit)) => {
                debug!(key, "Creation lock acquired");
                Ok(CreationLock {
                    key: key.to_string(),
                    permit: Some(permit),
                    semaphore,
                    locks: self.locks.clone(),
                })
            }
            Some(Err(_)) => {
                release_entry(&self.locks, key, &semaphore);
                Err(LockError::Closed {
                    key: key.to_string(),
                })
            }
            None => {
                release_entry(&self.locks, key, &semaphore);
                Err(LockError::Cancelled {
                    key: key.to_string(),
                })
            }
        }
    }

    /// Number of keys currently held or waited for.
    pub fn active_keys(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive ownership of one key. Released on drop.
pub struct CreationLock {
    key: String,
    permit: Option<OwnedSemaphorePermit>,
    semaphore: Arc<Semaphore>,
    locks: Arc<LockMap>,
}

impl CreationLock {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for CreationLock {
    fn drop(&mut self) {
        // The permit holds its own reference to the semaphore.
        self.permit.take();
        release_entry(&self.locks, &self.key, &self.semaphore);
        debug!(key = %self.key, "Creation lock released");
    }
}

/// Remove the map entry if `semaphore` is only referenced by the map and the caller.
fn release_entry(locks: &LockMap, key: &str, semaphore: &Arc<Semaphore>) {
    locks.remove_if(key, |_, current| {
        Arc::ptr_eq(current, semaphore) && Arc::strong_count(current) == 2
    });
}
