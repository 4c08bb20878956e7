//! Event infrastructure for domain events flowing through the event log.
//!
//! Incoming creation events implement `DomainEvent` through the
//! `domain_event!` macro. Everything that travels through the outbox is an
//! `EventEnvelope`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::Timestamp;

// ============================================
// DomainEvent Trait
// ============================================

/// Trait that all domain events must implement.
///
/// Provides the contract for event identification, routing, ordering, and versioning.
/// Use the `domain_event!` macro to implement this trait with minimal boilerplate.
pub trait DomainEvent: Send + Sync {
    /// Returns the event type string (e.g., "function.created.v1").
    fn event_type(&self) -> &'static str;

    /// Returns the schema version number.
    /// MUST match the version suffix in event_type.
    fn schema_version(&self) -> u32;

    /// Returns the ID of the aggregate that emitted this event.
    fn aggregate_id(&self) -> String;

    /// Returns the type of aggregate (e.g., "Function", "Profile").
    fn aggregate_type(&self) -> &'static str;

    /// Returns when the event occurred.
    fn occurred_at(&self) -> Timestamp;

    /// Returns the unique ID for this event instance.
    fn event_id(&self) -> EventId;
}

/// `to_envelope()` for every serializable domain event.
pub trait SerializableDomainEvent: DomainEvent + Serialize {
    fn to_envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        EventEnvelope::from_event(self)
    }
}

impl<T: DomainEvent + Serialize> SerializableDomainEvent for T {}

/// Macro to implement DomainEvent trait with minimal boilerplate.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct FunctionCreated {
///     pub event_id: EventId,
///     pub function_id: String,
///     pub created_at: Timestamp,
/// }
///
/// domain_event!(
///     FunctionCreated,
///     event_type = "function.created.v1",
///     schema_version = 1,
///     aggregate_id = function_id,
///     aggregate_type = "Function",
///     occurred_at = created_at,
///     event_id = event_id
/// );
/// ```
#[macro_export]
macro_rules! domain_event {
    (
        $event_name:ident,
        event_type = $event_type:expr,
        schema_version = $schema_version:expr,
        aggregate_id = $agg_id_field:ident,
        aggregate_type = $agg_type:expr,
        occurred_at = $occurred_field:ident,
        event_id = $event_id_field:ident
    ) => {
        impl $crate::domain::foundation::DomainEvent for $event_name {
            fn event_type(&self) -> &'static str {
                $event_type
            }

            fn schema_version(&self) -> u32 {
                $schema_version
            }

            fn aggregate_id(&self) -> String {
                self.$agg_id_field.to_string()
            }

            fn aggregate_type(&self) -> &'static str {
                $agg_type
            }

            fn occurred_at(&self) -> $crate::domain::foundation::Timestamp {
                self.$occurred_field
            }

            fn event_id(&self) -> $crate::domain::foundation::EventId {
                self.$event_id_field.clone()
            }
        }
    };
}

/// Unique identifier for events (used for deduplication).
///
/// Uses a String internally so that ids minted by other services
/// (UUID, ULID, ...) survive a round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates an EventId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation context carried alongside the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Id of the event this one reacts to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
}

/// What the event log stages and the event store appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    /// Dotted name with a version suffix, e.g. "function.projected.v1".
    pub event_type: String,
    pub schema_version: u32,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub occurred_at: Timestamp,
    pub payload: JsonValue,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Envelope with a fresh id, stamped now. The schema version comes from
    /// the `.vN` suffix of `event_type` (1 without one).
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        let event_type = event_type.into();
        Self {
            event_id: EventId::new(),
            schema_version: Self::extract_version(&event_type),
            event_type,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            occurred_at: Timestamp::now(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    pub(crate) fn extract_version(event_type: &str) -> u32 {
        event_type
            .rsplit_once(".v")
            .and_then(|(_, version)| version.parse().ok())
            .unwrap_or(1)
    }

    /// Wrap a domain event, keeping its id and timestamp.
    pub fn from_event<T>(event: &T) -> Result<Self, serde_json::Error>
    where
        T: DomainEvent + Serialize + ?Sized,
    {
        Ok(Self {
            event_id: event.event_id(),
            event_type: event.event_type().to_string(),
            schema_version: event.schema_version(),
            aggregate_id: event.aggregate_id(),
            aggregate_type: event.aggregate_type().to_string(),
            occurred_at: event.occurred_at(),
            payload: serde_json::to_value(event)?,
            metadata: EventMetadata::default(),
        })
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.causation_id = Some(id.into());
        self
    }
}

#[cfg(test)]
impl EventEnvelope {
    pub fn test_fixture() -> Self {
        Self::new(
            "profile.updated.v1",
            "p-123",
            "Profile",
            serde_json::json!({"display_name": "Ada"}),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_id_generates_unique_values() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn event_id_serializes_to_json() {
        let id = EventId::from_string("e1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""e1""#);
    }

    #[test]
    fn metadata_omits_missing_ids() {
        let envelope = EventEnvelope::new("tag.created.v1", "t1", "Tag", json!({}))
            .with_correlation_id("cmd-1");

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["metadata"]["correlation_id"], "cmd-1");
        assert!(json["metadata"].get("causation_id").is_none());
    }

    #[test]
    fn extracts_schema_version_from_type() {
        assert_eq!(EventEnvelope::extract_version("function.created.v2"), 2);
        assert_eq!(EventEnvelope::extract_version("function.created.v10"), 10);
        assert_eq!(EventEnvelope::extract_version("legacy.event"), 1);
    }

    #[test]
    fn domain_event_macro_builds_envelope() {
        #[derive(Debug, Clone, Serialize)]
        struct Alarm {
            event_id: EventId,
            alarm_id: String,
            at: Timestamp,
        }

        domain_event!(
            Alarm,
            event_type = "alarm.fired.v3",
            schema_version = 3,
            aggregate_id = alarm_id,
            aggregate_type = "Alarm",
            occurred_at = at,
            event_id = event_id
        );

        let alarm = Alarm {
            event_id: EventId::from_string("p-1"),
            alarm_id: "alarm-7".to_string(),
            at: Timestamp::now(),
        };
        let envelope = alarm.to_envelope().unwrap();

        assert_eq!(envelope.event_id.as_str(), "p-1");
        assert_eq!(envelope.schema_version, 3);
        assert_eq!(envelope.aggregate_id, "alarm-7");
        assert_eq!(envelope.payload["alarm_id"], "alarm-7");
    }
}
