//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a batch of staged events in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Creates a new random BatchId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a BatchId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The empty (all-zero) id. Never a valid batch.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns true for the all-zero id.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Correlation id of one command process (saga instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(Uuid);

impl ProcessId {
    /// Creates a new random ProcessId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a ProcessId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_id_generates_unique_values() {
        assert_ne!(BatchId::new(), BatchId::new());
    }

    #[test]
    fn batch_id_nil_is_detected() {
        assert!(BatchId::nil().is_nil());
        assert!(!BatchId::new().is_nil());
        assert!(BatchId::from_uuid(Uuid::nil()).is_nil());
    }

    #[test]
    fn batch_id_parses_from_string() {
        let id = BatchId::new();
        let parsed: BatchId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn batch_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<BatchId>().is_err());
    }

    #[test]
    fn batch_id_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&BatchId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn process_id_displays_inner_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(ProcessId::from_uuid(uuid).to_string(), uuid.to_string());
    }
}
