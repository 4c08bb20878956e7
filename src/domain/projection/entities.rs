//! Entities of the first-level projection.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{Timestamp, ValidationError};

/// A function: a role held within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub id: String,
    pub organization_id: String,
    pub role_id: String,
    pub name: String,
    pub created_at: Timestamp,
}

impl Function {
    pub fn new(
        id: impl Into<String>,
        organization_id: impl Into<String>,
        role_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let function = Self {
            id: id.into(),
            organization_id: organization_id.into(),
            role_id: role_id.into(),
            name: name.into(),
            created_at: Timestamp::now(),
        };
        if function.id.is_empty() {
            return Err(ValidationError::empty_field("function_id"));
        }
        if function.organization_id.is_empty() {
            return Err(ValidationError::empty_field("organization_id"));
        }
        if function.role_id.is_empty() {
            return Err(ValidationError::empty_field("role_id"));
        }
        Ok(function)
    }

    /// Identity of the function in the real world, independent of its id.
    pub fn uniqueness_key(&self) -> String {
        function_uniqueness_key(&self.organization_id, &self.role_id)
    }
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub external_id: Option<String>,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: Timestamp,
}

impl Profile {
    pub fn new(
        id: impl Into<String>,
        external_id: Option<String>,
        display_name: impl Into<String>,
        email: Option<String>,
    ) -> Result<Self, ValidationError> {
        let profile = Self {
            id: id.into(),
            external_id,
            display_name: display_name.into(),
            email,
            created_at: Timestamp::now(),
        };
        if profile.id.is_empty() {
            return Err(ValidationError::empty_field("profile_id"));
        }
        if profile.display_name.trim().is_empty() {
            return Err(ValidationError::empty_field("display_name"));
        }
        Ok(profile)
    }

    pub fn uniqueness_key(&self) -> String {
        user_uniqueness_key(
            self.external_id.as_deref(),
            &self.display_name,
            self.email.as_deref(),
        )
    }
}

/// A tag that can be assigned to profiles and functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

impl Tag {
    /// Creates a tag with a fresh id.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }
}

/// A tag reference carried by creation events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAssignment {
    pub tag_id: String,
    /// Name used when the tag has to be created on the fly.
    pub name: String,
    #[serde(default)]
    pub is_inheritable: bool,
}

/// Key under which two function creations count as the same function.
pub fn function_uniqueness_key(organization_id: &str, role_id: &str) -> String {
    format!("{}|{}", organization_id, role_id)
}

/// Key under which two user creations count as the same user.
pub fn user_uniqueness_key(
    external_id: Option<&str>,
    display_name: &str,
    email: Option<&str>,
) -> String {
    format!(
        "{}|{}|{}",
        external_id.unwrap_or_default(),
        display_name,
        email.unwrap_or_default()
    )
}
