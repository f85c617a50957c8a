// src/jsonapi/resolve.rs

//! Relationship inlining.
//!
//! Replaces every `relationships` reference of a primary resource with the
//! matching resource from the page's `included` side-table, depth-first.
//! The input is never mutated; a fresh JSON object is built instead.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use super::document::{RelationshipData, Resource, ResourceRef};

/// Lookup table over one page's `included` resources, keyed by `(type, id)`.
#[derive(Debug, Default)]
pub struct IncludedTable {
    by_key: HashMap<ResourceRef, Resource>,
}

impl IncludedTable {
    pub fn new(included: Vec<Resource>) -> Self {
        let by_key = included.into_iter().map(|r| (r.key(), r)).collect();
        Self { by_key }
    }

    pub fn get(&self, key: &ResourceRef) -> Option<&Resource> {
        self.by_key.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Resolve each relationship of `resource` to its inlined value.
///
/// To-one references become the related object or `null` when dangling.
/// To-many references keep their order and length; dangling entries become
/// `null` placeholders.
pub fn resolve(resource: &Resource, included: &IncludedTable) -> Map<String, Value> {
    let mut chain = HashSet::new();
    chain.insert(resource.key());
    resolve_with_chain(resource, included, &mut chain)
}

/// The resource as JSON with its resolved relationships merged in.
pub fn inline(resource: &Resource, included: &IncludedTable) -> Value {
    let mut obj = resource.to_object();
    obj.extend(resolve(resource, included));
    Value::Object(obj)
}

fn resolve_with_chain(
    resource: &Resource,
    included: &IncludedTable,
    chain: &mut HashSet<ResourceRef>,
) -> Map<String, Value> {
    let mut resolved = Map::new();

    for (key, relationship) in &resource.relationships {
        let value = match &relationship.data {
            None => Value::Null,
            Some(RelationshipData::One(reference)) => inline_ref(reference, included, chain),
            Some(RelationshipData::Many(references)) => Value::Array(
                references
                    .iter()
                    .map(|r| inline_ref(r, included, chain))
                    .collect(),
            ),
        };
        resolved.insert(key.clone(), value);
    }

    resolved
}

fn inline_ref(
    reference: &ResourceRef,
    included: &IncludedTable,
    chain: &mut HashSet<ResourceRef>,
) -> Value {
    let Some(related) = included.get(reference) else {
        return Value::Null;
    };

    let mut obj = related.to_object();

    // Already being resolved further up: hand back the plain stub.
    if related.relationships.is_empty() || !chain.insert(reference.clone()) {
        return Value::Object(obj);
    }

    let nested = resolve_with_chain(related, included, chain);
    chain.remove(reference);

    obj.extend(nested);
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(value: Value) -> Resource {
        serde_json::from_value(value).unwrap()
    }

    fn table(values: Vec<Value>) -> IncludedTable {
        IncludedTable::new(values.into_iter().map(resource).collect())
    }

    #[test]
    fn test_no_relationships_is_empty() {
        let r = resource(json!({ "id": "1", "type": "Page", "attributes": {} }));
        assert!(resolve(&r, &IncludedTable::default()).is_empty());
    }

    #[test]
    fn test_to_one_inlined() {
        let r = resource(json!({
            "id": "1", "type": "CalendarInstance",
            "relationships": { "event": { "data": { "id": "7", "type": "Event" } } }
        }));
        let included = table(vec![json!({
            "id": "7", "type": "Event", "attributes": { "name": "Picnic" }
        })]);

        let resolved = resolve(&r, &included);
        assert_eq!(resolved["event"]["id"], "7");
        assert_eq!(resolved["event"]["attributes"]["name"], "Picnic");
    }

    #[test]
    fn test_dangling_to_one_is_null() {
        let r = resource(json!({
            "id": "1", "type": "CalendarInstance",
            "relationships": { "event": { "data": { "id": "404", "type": "Event" } } }
        }));

        let resolved = resolve(&r, &IncludedTable::default());
        assert_eq!(resolved["event"], Value::Null);
    }

    #[test]
    fn test_to_many_keeps_positions() {
        let r = resource(json!({
            "id": "1", "type": "CalendarInstance",
            "relationships": { "tags": { "data": [
                { "id": "a", "type": "Tag" },
                { "id": "missing", "type": "Tag" },
                { "id": "b", "type": "Tag" }
            ] } }
        }));
        let included = table(vec![
            json!({ "id": "a", "type": "Tag", "attributes": { "name": "A" } }),
            json!({ "id": "b", "type": "Tag", "attributes": { "name": "B" } }),
        ]);

        let resolved = resolve(&r, &included);
        let tags = resolved["tags"].as_array().unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0]["attributes"]["name"], "A");
        assert_eq!(tags[1], Value::Null);
        assert_eq!(tags[2]["attributes"]["name"], "B");
    }

    #[test]
    fn test_lookup_uses_type_and_id() {
        let r = resource(json!({
            "id": "1", "type": "CalendarInstance",
            "relationships": { "event": { "data": { "id": "7", "type": "Event" } } }
        }));
        let included = table(vec![json!({ "id": "7", "type": "Tag", "attributes": {} })]);

        assert_eq!(resolve(&r, &included)["event"], Value::Null);
    }

    #[test]
    fn test_recursive_two_levels() {
        let r = resource(json!({
            "id": "1", "type": "CalendarInstance",
            "relationships": {
                "event": { "data": { "id": "7", "type": "Event" } },
                "tags": { "data": [{ "id": "t1", "type": "Tag" }, { "id": "t2", "type": "Tag" }] }
            }
        }));
        let included = table(vec![
            json!({ "id": "7", "type": "Event", "attributes": { "name": "Picnic" } }),
            json!({
                "id": "t1", "type": "Tag", "attributes": { "name": "Youth" },
                "relationships": { "tag_group": { "data": { "id": "g1", "type": "TagGroup" } } }
            }),
            json!({
                "id": "t2", "type": "Tag", "attributes": { "name": "Featured" },
                "relationships": { "tag_group": { "data": { "id": "g1", "type": "TagGroup" } } }
            }),
            json!({ "id": "g1", "type": "TagGroup", "attributes": { "name": "Ministry" } }),
        ]);

        let value = inline(&r, &included);
        assert_eq!(value["event"]["attributes"]["name"], "Picnic");
        assert_eq!(value["tags"][0]["tag_group"]["attributes"]["name"], "Ministry");
        assert_eq!(value["tags"][1]["tag_group"]["attributes"]["name"], "Ministry");
        // Original references stay available next to the inlined values.
        assert_eq!(value["relationships"]["event"]["data"]["id"], "7");
    }

    #[test]
    fn test_cycle_terminates_with_stub() {
        let r = resource(json!({
            "id": "a", "type": "Node",
            "relationships": { "next": { "data": { "id": "b", "type": "Node" } } }
        }));
        let included = table(vec![
            json!({
                "id": "a", "type": "Node",
                "relationships": { "next": { "data": { "id": "b", "type": "Node" } } }
            }),
            json!({
                "id": "b", "type": "Node",
                "relationships": { "next": { "data": { "id": "a", "type": "Node" } } }
            }),
        ]);

        let resolved = resolve(&r, &included);
        assert_eq!(resolved["next"]["id"], "b");
        assert_eq!(resolved["next"]["next"]["id"], "a");
        // The revisit of "a" is not expanded again.
        assert!(resolved["next"]["next"].get("next").is_none());
    }

    #[test]
    fn test_input_is_not_mutated() {
        let r = resource(json!({
            "id": "1", "type": "CalendarInstance",
            "relationships": { "event": { "data": { "id": "7", "type": "Event" } } }
        }));
        let before = r.clone();
        let included = table(vec![json!({ "id": "7", "type": "Event", "attributes": {} })]);

        let _ = inline(&r, &included);
        assert_eq!(r, before);
        assert_eq!(included.len(), 1);
    }
}
