//! First-level projection events.
//!
//! `FunctionCreated` and `UserCreated` arrive from the command side. The
//! handlers answer them with the events built here, addressed to the streams
//! of the entities they touch.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::entities::{Function, Profile, Tag, TagAssignment};
use crate::domain::event_log::EventTuple;
use crate::domain::foundation::{EventEnvelope, EventId, Timestamp};

/// A function was requested to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCreated {
    pub event_id: EventId,
    pub function_id: String,
    pub organization_id: String,
    pub role_id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<TagAssignment>,
    pub created_at: Timestamp,
}

crate::domain_event!(
    FunctionCreated,
    event_type = "function.created.v1",
    schema_version = 1,
    aggregate_id = function_id,
    aggregate_type = "Function",
    occurred_at = created_at,
    event_id = event_id
);

/// A user profile was requested to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    pub event_id: EventId,
    pub profile_id: String,
    pub external_id: Option<String>,
    pub display_name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagAssignment>,
    pub created_at: Timestamp,
}

crate::domain_event!(
    UserCreated,
    event_type = "user.created.v1",
    schema_version = 1,
    aggregate_id = profile_id,
    aggregate_type = "Profile",
    occurred_at = created_at,
    event_id = event_id
);

/// Stream names of the event store.
pub mod streams {
    pub fn function(id: &str) -> String {
        format!("function-{}", id)
    }

    pub fn organization(id: &str) -> String {
        format!("organization-{}", id)
    }

    pub fn role(id: &str) -> String {
        format!("role-{}", id)
    }

    pub fn profile(id: &str) -> String {
        format!("profile-{}", id)
    }

    pub fn tag(id: &str) -> String {
        format!("tag-{}", id)
    }
}

/// Events announcing a new function to its own, its organization's and its role's streams.
pub fn function_projected(function: &Function, cause: &EventId) -> Vec<EventTuple> {
    let payload = json!({
        "function_id": function.id,
        "organization_id": function.organization_id,
        "role_id": function.role_id,
        "name": function.name,
    });

    [
        streams::function(&function.id),
        streams::organization(&function.organization_id),
        streams::role(&function.role_id),
    ]
    .into_iter()
    .map(|stream| {
        let event = EventEnvelope::new(
            "function.projected.v1",
            function.id.clone(),
            "Function",
            payload.clone(),
        )
        .with_causation_id(cause.as_str());
        EventTuple::new(stream, event)
    })
    .collect()
}

/// Event announcing a new profile on its stream.
pub fn profile_projected(profile: &Profile, cause: &EventId) -> Vec<EventTuple> {
    let event = EventEnvelope::new(
        "profile.projected.v1",
        profile.id.clone(),
        "Profile",
        json!({
            "profile_id": profile.id,
            "external_id": profile.external_id,
            "display_name": profile.display_name,
            "email": profile.email,
        }),
    )
    .with_causation_id(cause.as_str());
    vec![EventTuple::new(streams::profile(&profile.id), event)]
}

/// Event announcing a tag that did not exist before.
pub fn tag_created(tag: &Tag, cause: &EventId) -> EventTuple {
    let event = EventEnvelope::new(
        "tag.created.v1",
        tag.id.clone(),
        "Tag",
        json!({ "tag_id": tag.id, "name": tag.name }),
    )
    .with_causation_id(cause.as_str());
    EventTuple::new(streams::tag(&tag.id), event)
}

/// Event assigning tags to the entity living on `entity_stream`.
pub fn tags_added(
    entity_stream: &str,
    entity_id: &str,
    aggregate_type: &str,
    tags: &[TagAssignment],
    cause: &EventId,
) -> EventTuple {
    let event = EventEnvelope::new(
        "tags.added.v1",
        entity_id,
        aggregate_type,
        json!({
            "entity_id": entity_id,
            "tags": tags,
        }),
    )
    .with_causation_id(cause.as_str());
    EventTuple::new(entity_stream, event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DomainEvent, SerializableDomainEvent};

    #[test]
    fn function_projection_targets_three_streams() {
        let function = Function::new("f1", "O1", "R1", "Sales lead").unwrap();
        let events = function_projected(&function, &EventId::from_string("cause"));

        let streams: Vec<_> = events.iter().map(|e| e.target_stream.as_str()).collect();
        assert_eq!(streams, vec!["function-f1", "organization-O1", "role-R1"]);
        assert!(events
            .iter()
            .all(|e| e.event.metadata.causation_id.as_deref() == Some("cause")));
    }

    #[test]
    fn function_created_envelope_uses_function_id_as_aggregate() {
        let event = FunctionCreated {
            event_id: EventId::new(),
            function_id: "f1".to_string(),
            organization_id: "O1".to_string(),
            role_id: "R1".to_string(),
            name: "Sales lead".to_string(),
            tags: vec![],
            created_at: Timestamp::now(),
        };

        assert_eq!(event.event_type(), "function.created.v1");
        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.aggregate_id, "f1");
        assert_eq!(envelope.aggregate_type, "Function");
    }

    #[test]
    fn tags_added_carries_assignments() {
        let tags = vec![TagAssignment {
            tag_id: "t1".to_string(),
            name: "external".to_string(),
            is_inheritable: true,
        }];
        let tuple = tags_added("profile-p1", "p1", "Profile", &tags, &EventId::new());

        assert_eq!(tuple.target_stream, "profile-p1");
        assert_eq!(tuple.event.payload["tags"][0]["tag_id"], "t1");
    }
}
