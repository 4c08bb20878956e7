//! First-level projection - the read model closest to the raw event stream.
//!
//! Holds the entities the projection creates, the uniqueness keys used to
//! detect duplicates, and the events it emits.

mod entities;
mod events;

pub use entities::{
    function_uniqueness_key, user_uniqueness_key, Function, Profile, Tag, TagAssignment,
};
pub use events::{
    function_projected, profile_projected, streams, tag_created, tags_added, FunctionCreated,
    UserCreated,
};

use serde::Deserialize;

/// What to do when an entity with the same uniqueness key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail the creation with an already-exists error.
    #[default]
    Reject,
    /// Create anyway and log a warning.
    Allow,
}

impl DuplicatePolicy {
    pub fn allows_duplicates(&self) -> bool {
        matches!(self, DuplicatePolicy::Allow)
    }
}
