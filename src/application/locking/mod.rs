//! Locking - keyed creation locks for the first-level projection.

mod creation_lock;

pub use creation_lock::{CreationLock, CreationLockService, LockError};
