//! JSON codec for items.
//!
//! Decoding is total: strings become links, arrays become bare lists, objects
//! become [`Object`]s. Unknown properties are ignored.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::item::{Item, Object, Shape};
use crate::link::Link;
use crate::natural_language::NaturalLanguageValues;

impl Item {
    /// Decode an item; `null` and scalars other than strings yield `None`.
    pub fn from_json(value: &Value) -> Option<Item> {
        match value {
            Value::String(s) => Some(Item::link(s.as_str())),
            Value::Array(values) => Some(Item::Collection(
                values.iter().filter_map(Item::from_json).collect(),
            )),
            Value::Object(map) => Some(Item::object(object_from_map(map))),
            _ => None,
        }
    }

    pub fn from_slice(raw: &[u8]) -> serde_json::Result<Item> {
        let value: Value = serde_json::from_slice(raw)?;
        Ok(Item::from_json(&value).unwrap_or(Item::Collection(Vec::new())))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Item::Link(link) => Value::String(link.as_str().to_string()),
            Item::Object(obj) => Value::Object(object_to_map(obj)),
            Item::Collection(items) => Value::Array(items.iter().map(Item::to_json).collect()),
        }
    }
}

fn object_from_map(map: &Map<String, Value>) -> Object {
    let kind = match map.get("type") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .find_map(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    let mut obj = Object {
        id: map
            .get("id")
            .and_then(Value::as_str)
            .map(Link::from)
            .unwrap_or_default(),
        kind,
        name: NaturalLanguageValues::from_json(map, "name"),
        summary: NaturalLanguageValues::from_json(map, "summary"),
        content: NaturalLanguageValues::from_json(map, "content"),
        preferred_username: NaturalLanguageValues::from_json(map, "preferredUsername"),
        attributed_to: single(map, "attributedTo"),
        in_reply_to: single(map, "inReplyTo"),
        context: single(map, "context"),
        url: single(map, "url"),
        to: many(map, "to"),
        cc: many(map, "cc"),
        bto: many(map, "bto"),
        bcc: many(map, "bcc"),
        audience: many(map, "audience"),
        tag: many(map, "tag"),
        actor: single(map, "actor"),
        object: single(map, "object"),
        target: single(map, "target"),
        items: None,
        total_items: map.get("totalItems").and_then(Value::as_u64),
        published: map
            .get("published")
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    if obj.shape().is_collection() {
        let members = map
            .get("orderedItems")
            .or_else(|| map.get("items"))
            .map(|v| many_from(v))
            .unwrap_or_default();
        obj.items = Some(members);
    }
    obj
}

fn single(map: &Map<String, Value>, key: &str) -> Option<Item> {
    map.get(key).and_then(Item::from_json)
}

fn many(map: &Map<String, Value>, key: &str) -> Vec<Item> {
    map.get(key).map(many_from).unwrap_or_default()
}

fn many_from(value: &Value) -> Vec<Item> {
    match Item::from_json(value) {
        Some(Item::Collection(items)) => items,
        Some(item) => vec![item],
        None => Vec::new(),
    }
}

fn object_to_map(obj: &Object) -> Map<String, Value> {
    let mut map = Map::new();
    if !obj.id.as_str().is_empty() {
        map.insert("id".into(), Value::String(obj.id.as_str().to_string()));
    }
    if !obj.kind.is_empty() {
        map.insert("type".into(), Value::String(obj.kind.clone()));
    }
    obj.name.write_json(&mut map, "name");
    obj.summary.write_json(&mut map, "summary");
    obj.content.write_json(&mut map, "content");
    obj.preferred_username
        .write_json(&mut map, "preferredUsername");

    let singles = [
        ("attributedTo", &obj.attributed_to),
        ("inReplyTo", &obj.in_reply_to),
        ("context", &obj.context),
        ("url", &obj.url),
        ("actor", &obj.actor),
        ("object", &obj.object),
        ("target", &obj.target),
    ];
    for (key, value) in singles {
        if let Some(item) = value {
            map.insert(key.into(), item.to_json());
        }
    }

    let lists = [
        ("to", &obj.to),
        ("cc", &obj.cc),
        ("bto", &obj.bto),
        ("bcc", &obj.bcc),
        ("audience", &obj.audience),
        ("tag", &obj.tag),
    ];
    for (key, items) in lists {
        if !items.is_empty() {
            map.insert(
                key.into(),
                Value::Array(items.iter().map(Item::to_json).collect()),
            );
        }
    }

    if let Some(items) = &obj.items {
        let key = if obj.shape() == Shape::OrderedCollection {
            "orderedItems"
        } else {
            "items"
        };
        map.insert(
            key.into(),
            Value::Array(items.iter().map(Item::to_json).collect()),
        );
    }
    if let Some(total) = obj.total_items {
        map.insert("totalItems".into(), Value::from(total));
    }
    if let Some(published) = &obj.published {
        map.insert("published".into(), Value::String(published.clone()));
    }
    map
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Item::from_json(&value).unwrap_or(Item::Collection(Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_activity_with_nested_object() {
        let raw = json!({
            "id": "https://example.com/create/1",
            "type": "Create",
            "actor": "https://example.com/bob",
            "to": "https://www.w3.org/ns/activitystreams#Public",
            "object": {"type": "Note", "content": "hello"}
        });
        let item = Item::from_json(&raw).expect("item");
        let act = item.as_object().expect("object");
        assert_eq!(act.shape(), Shape::Activity);
        assert_eq!(act.actor, Some(Item::link("https://example.com/bob")));
        assert_eq!(act.to.len(), 1);
        let note = act.object.as_ref().and_then(Item::as_object).expect("note");
        assert_eq!(note.content.first(), Some("hello"));
        assert!(note.id.is_nil());
    }

    #[test]
    fn ordered_collections_use_ordered_items() {
        let raw = json!({
            "id": "https://example.com/outbox",
            "type": "OrderedCollection",
            "orderedItems": ["https://a", "https://b"]
        });
        let item = Item::from_json(&raw).expect("item");
        assert_eq!(item.members().map(<[Item]>::len), Some(2));
        let back = item.to_json();
        assert_eq!(back["orderedItems"], json!(["https://a", "https://b"]));
    }

    #[test]
    fn serde_roundtrip_through_strings() {
        let raw = r#"{"id":"https://x","type":"Person","preferredUsername":"bob"}"#;
        let item: Item = serde_json::from_str(raw).expect("decode");
        let text = serde_json::to_string(&item).expect("encode");
        let again: Item = serde_json::from_str(&text).expect("decode again");
        assert_eq!(item, again);
    }
}
