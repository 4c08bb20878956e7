//! First-level projection configuration

use serde::Deserialize;

use crate::domain::projection::DuplicatePolicy;

/// Duplicate handling per entity type.
///
/// Both default to rejecting a second entity with the same uniqueness key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub functions: DuplicatePolicy,

    #[serde(default)]
    pub users: DuplicatePolicy,
}
