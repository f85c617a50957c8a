// src/models/group.rs

//! Groups product records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::jsonapi::{Relationship, RelationshipData};

/// A tag attached to a group (e.g., value "Youth" in tag group "Ministry").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGroupTag")]
pub struct GroupTag {
    pub id: String,
    pub value: String,
    pub tag_group_id: String,
}

#[derive(Deserialize)]
struct RawGroupTag {
    id: String,
    attributes: GroupTagAttributes,
    #[serde(default)]
    relationships: BTreeMap<String, Relationship>,
}

#[derive(Deserialize)]
struct GroupTagAttributes {
    name: String,
}

impl TryFrom<RawGroupTag> for GroupTag {
    type Error = String;

    fn try_from(raw: RawGroupTag) -> Result<Self, Self::Error> {
        let tag_group_id = match raw.relationships.get("tag_group").and_then(|r| r.data.as_ref()) {
            Some(RelationshipData::One(reference)) => reference.id.clone(),
            _ => return Err(format!("group tag {} has no tag_group reference", raw.id)),
        };

        Ok(Self {
            id: raw.id,
            value: raw.attributes.name,
            tag_group_id,
        })
    }
}

/// A category of group tags (e.g., "Ministry", "Age").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawGroupTagGroup")]
pub struct GroupTagGroup {
    pub id: String,
    pub name: String,
    pub display_publicly: bool,
    pub multiple_options_enabled: bool,
}

#[derive(Deserialize)]
struct RawGroupTagGroup {
    id: String,
    attributes: GroupTagGroupAttributes,
}

#[derive(Deserialize)]
struct GroupTagGroupAttributes {
    name: String,
    #[serde(default)]
    display_publicly: bool,
    #[serde(default)]
    multiple_options_enabled: bool,
}

impl From<RawGroupTagGroup> for GroupTagGroup {
    fn from(raw: RawGroupTagGroup) -> Self {
        Self {
            id: raw.id,
            name: raw.attributes.name,
            display_publicly: raw.attributes.display_publicly,
            multiple_options_enabled: raw.attributes.multiple_options_enabled,
        }
    }
}
