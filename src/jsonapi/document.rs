// src/jsonapi/document.rs

//! JSON:API envelope types.
//!
//! Only the shapes Planning Center emits are modelled: to-one references
//! (possibly `null`), to-many reference lists, and the `{count, total_count}`
//! meta block used for offset pagination.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

/// A collection (or single-resource) response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(deserialize_with = "one_or_many")]
    pub data: Vec<Resource>,

    #[serde(default)]
    pub included: Vec<Resource>,

    #[serde(default)]
    pub meta: Option<Meta>,
}

impl Document {
    /// Pagination meta, falling back to "this is the only page" when absent.
    pub fn page_meta(&self) -> Meta {
        self.meta.clone().unwrap_or(Meta {
            count: self.data.len(),
            total_count: self.data.len(),
        })
    }
}

/// Pagination counters reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Resources returned on this page
    pub count: usize,
    /// Resources across all pages
    pub total_count: usize,
}

/// Identifies a resource within one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ResourceRef {
    pub fn to_value(&self) -> Value {
        json!({ "id": self.id, "type": self.kind })
    }
}

/// Shape of a relationship's `data` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    One(ResourceRef),
    Many(Vec<ResourceRef>),
}

/// A relationship entry. Links-only entries decode with `data: None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<RelationshipData>,
}

impl Relationship {
    fn to_value(&self) -> Value {
        let data = match &self.data {
            None => Value::Null,
            Some(RelationshipData::One(r)) => r.to_value(),
            Some(RelationshipData::Many(refs)) => {
                Value::Array(refs.iter().map(ResourceRef::to_value).collect())
            }
        };
        json!({ "data": data })
    }
}

/// One JSON:API resource object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub attributes: Map<String, Value>,

    #[serde(default, deserialize_with = "nullable_map")]
    pub relationships: BTreeMap<String, Relationship>,
}

impl Resource {
    pub fn key(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind.clone(),
            id: self.id.clone(),
        }
    }

    /// The resource as plain JSON, without any inlining.
    pub fn to_object(&self) -> Map<String, Value> {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(self.id.clone()));
        obj.insert("type".into(), Value::String(self.kind.clone()));
        obj.insert("attributes".into(), Value::Object(self.attributes.clone()));
        if !self.relationships.is_empty() {
            let rels = self
                .relationships
                .iter()
                .map(|(k, r)| (k.clone(), r.to_value()))
                .collect();
            obj.insert("relationships".into(), Value::Object(rels));
        }
        obj
    }
}

/// Single-resource endpoints return an object under `data` rather than a list.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<Resource>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Resource>),
        One(Box<Resource>),
        Null,
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(r) => vec![*r],
        OneOrMany::Null => Vec::new(),
    })
}

fn nullable_map<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Relationship>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, Relationship>>::deserialize(deserializer)?.unwrap_or_default())
}
