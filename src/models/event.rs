// src/models/event.rs

//! Calendar records: instances, events, tags, connections and registrations.
//!
//! Each record deserializes from an inlined JSON:API resource (attributes
//! nested under `attributes`, relationships inlined at the top level) and
//! serializes flat, which is the shape the site's `events` collection reads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_or_number;

/// Approval state of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventApprovalStatus {
    #[serde(rename = "A")]
    Approved,
    #[serde(rename = "P")]
    Pending,
    #[serde(rename = "R")]
    Rejected,
}

/// A calendar tag, flattened with the name of its tag group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTag")]
pub struct Tag {
    pub id: String,
    pub color: String,
    pub name: String,
    /// Name of the tag group (e.g., "Ministry")
    pub group: String,
}

#[derive(Deserialize)]
struct RawTag {
    id: String,
    attributes: TagAttributes,
    tag_group: NamedResource,
}

#[derive(Deserialize)]
struct TagAttributes {
    color: String,
    name: String,
}

#[derive(Deserialize)]
struct NamedResource {
    attributes: NameAttribute,
}

#[derive(Deserialize)]
struct NameAttribute {
    name: String,
}

impl From<RawTag> for Tag {
    fn from(raw: RawTag) -> Self {
        Self {
            id: raw.id,
            color: raw.attributes.color,
            name: raw.attributes.name,
            group: raw.tag_group.attributes.name,
        }
    }
}

/// A calendar event (the series a calendar instance belongs to).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEvent")]
pub struct Event {
    pub id: String,
    pub approval_status: EventApprovalStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub featured: bool,
    pub image_url: Option<String>,
    pub name: String,
    pub percent_approved: Option<i64>,
    pub percent_rejected: Option<i64>,
    pub registration_url: Option<String>,
    pub summary: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub visible_in_church_center: bool,
    pub tags: Vec<Tag>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    attributes: EventAttributes,
    #[serde(default)]
    tags: Option<Vec<Option<Tag>>>,
}

#[derive(Deserialize)]
struct EventAttributes {
    approval_status: EventApprovalStatus,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    description: Option<String>,
    featured: bool,
    #[serde(default)]
    image_url: Option<String>,
    name: String,
    #[serde(default)]
    percent_approved: Option<i64>,
    #[serde(default)]
    percent_rejected: Option<i64>,
    #[serde(default)]
    registration_url: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    visible_in_church_center: bool,
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        let a = raw.attributes;
        Self {
            tags: present_tags(&raw.id, raw.tags),
            id: raw.id,
            approval_status: a.approval_status,
            created_at: a.created_at,
            description: a.description,
            featured: a.featured,
            image_url: a.image_url,
            name: a.name,
            percent_approved: a.percent_approved,
            percent_rejected: a.percent_rejected,
            registration_url: a.registration_url,
            summary: a.summary,
            updated_at: a.updated_at,
            visible_in_church_center: a.visible_in_church_center,
        }
    }
}

/// One occurrence of an event on the calendar, plus the enrichment the
/// export attaches before writing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCalendarInstance")]
pub struct CalendarInstance {
    pub id: String,
    pub all_day_event: bool,
    pub ends_at: DateTime<Utc>,
    pub event_featured: bool,
    pub event_name: String,
    pub starts_at: DateTime<Utc>,
    pub status: String,
    pub visible_ends_at: DateTime<Utc>,
    pub visible_starts_at: DateTime<Utc>,

    pub event: Option<Event>,
    pub tags: Vec<Tag>,

    /// Tag group name -> tag name, from the instance tags
    pub event_tags: BTreeMap<String, String>,
    /// Groups tag group name -> tag value, from connected groups
    pub group_tags: BTreeMap<String, String>,
    pub ministry: String,
    pub color: String,
    pub registration: Option<RegistrationEvent>,
}

#[derive(Deserialize)]
struct RawCalendarInstance {
    id: String,
    attributes: CalendarInstanceAttributes,
    #[serde(default)]
    event: Option<Event>,
    #[serde(default)]
    tags: Option<Vec<Option<Tag>>>,
}

#[derive(Deserialize)]
struct CalendarInstanceAttributes {
    all_day_event: bool,
    ends_at: DateTime<Utc>,
    event_featured: bool,
    event_name: String,
    starts_at: DateTime<Utc>,
    status: String,
    visible_ends_at: DateTime<Utc>,
    visible_starts_at: DateTime<Utc>,
}

impl From<RawCalendarInstance> for CalendarInstance {
    fn from(raw: RawCalendarInstance) -> Self {
        let a = raw.attributes;
        Self {
            tags: present_tags(&raw.id, raw.tags),
            id: raw.id,
            all_day_event: a.all_day_event,
            ends_at: a.ends_at,
            event_featured: a.event_featured,
            event_name: a.event_name,
            starts_at: a.starts_at,
            status: a.status,
            visible_ends_at: a.visible_ends_at,
            visible_starts_at: a.visible_starts_at,
            event: raw.event,
            event_tags: BTreeMap::new(),
            group_tags: BTreeMap::new(),
            ministry: String::new(),
            color: String::new(),
            registration: None,
        }
    }
}

/// Drop tag references the page did not include.
fn present_tags(owner: &str, tags: Option<Vec<Option<Tag>>>) -> Vec<Tag> {
    let tags = tags.unwrap_or_default();
    let total = tags.len();
    let present: Vec<Tag> = tags.into_iter().flatten().collect();
    if present.len() < total {
        log::warn!(
            "{}: {} tag reference(s) missing from included resources",
            owner,
            total - present.len()
        );
    }
    present
}

/// A link from a calendar event to a resource in another product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEventConnection")]
pub struct EventConnection {
    pub id: String,
    pub connected_to_id: String,
    pub connected_to_name: String,
    /// "group", "signup", ...
    pub connected_to_type: String,
    pub connected_to_url: Option<String>,
    pub product_name: String,
}

#[derive(Deserialize)]
struct RawEventConnection {
    id: String,
    attributes: EventConnectionAttributes,
}

#[derive(Deserialize)]
struct EventConnectionAttributes {
    #[serde(deserialize_with = "string_or_number")]
    connected_to_id: String,
    connected_to_name: String,
    connected_to_type: String,
    #[serde(default)]
    connected_to_url: Option<String>,
    product_name: String,
}

impl From<RawEventConnection> for EventConnection {
    fn from(raw: RawEventConnection) -> Self {
        let a = raw.attributes;
        Self {
            id: raw.id,
            connected_to_id: a.connected_to_id,
            connected_to_name: a.connected_to_name,
            connected_to_type: a.connected_to_type,
            connected_to_url: a.connected_to_url,
            product_name: a.product_name,
        }
    }
}

/// Signup state of a registrations event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRegistrationEvent")]
pub struct RegistrationEvent {
    pub id: String,
    pub at_maximum_capacity: bool,
    pub visibility: String,
    pub closed: bool,
    pub open: bool,
    pub open_at: Option<DateTime<Utc>>,
    pub hide_at: Option<DateTime<Utc>>,
    pub show_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawRegistrationEvent {
    id: String,
    attributes: RegistrationAttributes,
}

#[derive(Deserialize)]
struct RegistrationAttributes {
    #[serde(default)]
    at_maximum_capacity: bool,
    visibility: String,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    open: bool,
    #[serde(default)]
    open_at: Option<DateTime<Utc>>,
    #[serde(default)]
    hide_at: Option<DateTime<Utc>>,
    #[serde(default)]
    show_at: Option<DateTime<Utc>>,
}

impl From<RawRegistrationEvent> for RegistrationEvent {
    fn from(raw: RawRegistrationEvent) -> Self {
        let a = raw.attributes;
        Self {
            id: raw.id,
            at_maximum_capacity: a.at_maximum_capacity,
            visibility: a.visibility,
            closed: a.closed,
            open: a.open,
            open_at: a.open_at,
            hide_at: a.hide_at,
            show_at: a.show_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonapi::decode;
    use serde_json::json;

    fn inlined_instance() -> serde_json::Value {
        json!({
            "id": "1001",
            "type": "CalendarInstance",
            "attributes": {
                "all_day_event": false,
                "ends_at": "2025-02-02T18:00:00Z",
                "event_featured": true,
                "event_name": "Youth Night",
                "starts_at": "2025-02-02T16:00:00Z",
                "status": "confirmed",
                "visible_ends_at": "2025-02-02T18:00:00Z",
                "visible_starts_at": "2025-02-02T16:00:00Z"
            },
            "event": {
                "id": "55",
                "type": "Event",
                "attributes": {
                    "approval_status": "A",
                    "featured": true,
                    "image_url": "https://images.example.com/a/b.png",
                    "name": "Youth Night",
                    "visible_in_church_center": true,
                    "percent_approved": 100
                }
            },
            "tags": [
                {
                    "id": "t1",
                    "type": "Tag",
                    "attributes": { "color": "#fff", "name": "Rooted (Youth Ministry)" },
                    "tag_group": { "id": "g1", "type": "TagGroup", "attributes": { "name": "Ministry" } }
                },
                null
            ]
        })
    }

    #[test]
    fn test_decode_calendar_instance() {
        let instance: CalendarInstance = decode(inlined_instance()).unwrap();

        assert_eq!(instance.event_name, "Youth Night");
        assert_eq!(instance.tags.len(), 1);
        assert_eq!(instance.tags[0].group, "Ministry");

        let event = instance.event.unwrap();
        assert_eq!(event.approval_status, EventApprovalStatus::Approved);
        assert_eq!(event.percent_approved, Some(100));
        assert_eq!(event.created_at, None);
    }

    #[test]
    fn test_missing_required_attribute_fails() {
        let mut value = inlined_instance();
        value["attributes"]
            .as_object_mut()
            .unwrap()
            .remove("starts_at");
        assert!(decode::<CalendarInstance>(value).is_err());
    }

    #[test]
    fn test_serializes_flat() {
        let instance: CalendarInstance = decode(inlined_instance()).unwrap();
        let out = serde_json::to_value(&instance).unwrap();

        assert_eq!(out["event_name"], "Youth Night");
        assert_eq!(out["starts_at"], "2025-02-02T16:00:00Z");
        assert_eq!(out["event"]["approval_status"], "A");
        assert_eq!(out["tags"][0]["group"], "Ministry");
        assert!(out.get("attributes").is_none());
    }

    #[test]
    fn test_connection_id_accepts_numbers() {
        let connection: EventConnection = decode(json!({
            "id": "c1",
            "type": "EventConnection",
            "attributes": {
                "connected_to_id": 4242,
                "connected_to_name": "Youth Group",
                "connected_to_type": "group",
                "connected_to_url": "https://groups.example.com/4242",
                "product_name": "groups"
            }
        }))
        .unwrap();
        assert_eq!(connection.connected_to_id, "4242");
    }

    #[test]
    fn test_decode_registration() {
        let registration: RegistrationEvent = decode(json!({
            "id": "r9",
            "type": "Event",
            "attributes": {
                "at_maximum_capacity": false,
                "visibility": "public",
                "open": true,
                "open_at": "2025-01-01T00:00:00Z"
            }
        }))
        .unwrap();
        assert!(registration.open);
        assert!(!registration.closed);
        assert!(registration.open_at.is_some());
    }
}
