//! Language-keyed string values (`name`, `summary`, `content`, ...).

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Language tag used for values that carry no language.
pub const UNDETERMINED: &str = "und";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NaturalLanguageValues(BTreeMap<String, String>);

impl NaturalLanguageValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single untagged value.
    pub fn und(value: impl Into<String>) -> Self {
        let mut out = Self::new();
        out.insert(UNDETERMINED, value);
        out
    }

    pub fn insert(&mut self, lang: impl Into<String>, value: impl Into<String>) {
        self.0.insert(lang.into(), value.into());
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0.get(lang).map(String::as_str)
    }

    /// Non-empty values, in language-tag order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when no non-empty value is present.
    pub fn is_empty(&self) -> bool {
        self.values().next().is_none()
    }

    pub fn first(&self) -> Option<&str> {
        self.get(UNDETERMINED).or_else(|| self.values().next())
    }

    /// Read `<key>` (plain string) and `<key>Map` (language map) from a JSON
    /// object. A plain string lands under [`UNDETERMINED`].
    pub fn from_json(obj: &Map<String, Value>, key: &str) -> Self {
        let mut out = Self::new();
        match obj.get(key) {
            Some(Value::String(s)) => out.insert(UNDETERMINED, s.as_str()),
            Some(Value::Object(map)) => out.extend_from_map(map),
            _ => {}
        }
        if let Some(Value::Object(map)) = obj.get(&format!("{key}Map")) {
            out.extend_from_map(map);
        }
        out
    }

    fn extend_from_map(&mut self, map: &Map<String, Value>) {
        for (lang, value) in map {
            if let Value::String(s) = value {
                self.insert(lang.as_str(), s.as_str());
            }
        }
    }

    /// Write the plain form when only an untagged value exists, the map form
    /// otherwise. Empty values write nothing.
    pub fn write_json(&self, obj: &mut Map<String, Value>, key: &str) {
        if self.0.is_empty() {
            return;
        }
        if self.0.len() == 1 {
            if let Some(v) = self.get(UNDETERMINED) {
                obj.insert(key.to_string(), Value::String(v.to_string()));
                return;
            }
        }
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        obj.insert(format!("{key}Map"), Value::Object(map));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NaturalLanguageValues {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
