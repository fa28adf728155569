//! Event patterns: match checks against raw serialized records.
//!
//! A pattern is a JSON object keyed by field name. Leaf values are arrays of
//! alternatives:
//!
//! ```text
//! "Note"                       literal
//! {"prefix": "https://x/"}     string prefix
//! {"exists": false}            field absent
//! {"anything-but": ["", "-"]}  field present with none of these values
//! ```
//!
//! Nested objects (`"object": {...}`) descend into sub-records. A field holding
//! a bare string where a nested pattern is expected is read as `{"id": ...}`,
//! and an embedded object compared against a literal is compared by its `id`.
//! The empty pattern matches every record.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::check::{is_nil_value, Check, Checks, LinkMatch, Projection, TextMatch};
use apfilter_vocab::NIL_MARKER;

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern must be a JSON object")]
    NotAnObject,

    #[error("field `{0}` has no alternatives")]
    EmptyAlternatives(String),

    #[error("field `{field}`: unsupported operator `{operator}`")]
    UnknownOperator { field: String, operator: String },

    #[error("field `{field}`: malformed operand for `{operator}`")]
    BadOperand { field: String, operator: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Building a pattern from checks
// ============================================================================

/// Render the supported checks as a pattern object. Checks with no pattern
/// form contribute nothing.
pub fn build_pattern(checks: &Checks) -> Value {
    Value::Object(pattern_map(checks.as_slice()))
}

fn pattern_map(checks: &[Check]) -> Map<String, Value> {
    let mut map = Map::new();
    for check in checks {
        add_check(&mut map, check);
    }
    map
}

fn add_check(map: &mut Map<String, Value>, check: &Check) {
    match check {
        Check::All(children) => {
            for child in children {
                add_check(map, child);
            }
        }
        other => match entry(other) {
            Some((key, value)) => merge_entry(map, key, value),
            None => debug!(?other, "no pattern form, skipping"),
        },
    }
}

/// Conjunction of two constraints on one key: nested patterns merge, leaf
/// alternatives keep the first constraint.
fn merge_entry(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        None => {
            map.insert(key, value);
        }
        Some(Value::Object(existing)) => match value {
            Value::Object(incoming) => {
                for (k, v) in incoming {
                    merge_entry(existing, k, v);
                }
            }
            _ => debug!(%key, "conflicting constraints on the same field, keeping the first"),
        },
        Some(_) => debug!(%key, "second constraint on the same field, keeping the first"),
    }
}

fn entry(check: &Check) -> Option<(String, Value)> {
    match check {
        Check::Not(Some(inner)) => leaf_entry(inner, true),
        Check::Project(projection, checks) => {
            let nested = pattern_map(checks);
            (!nested.is_empty()).then(|| (projection_key(*projection), Value::Object(nested)))
        }
        Check::Any(children) => any_entry(children),
        other => leaf_entry(other, false),
    }
}

fn projection_key(projection: Projection) -> String {
    projection.key().to_string()
}

/// Alternatives on a single key fold into one array; anything else has no
/// pattern form.
fn any_entry(children: &[Check]) -> Option<(String, Value)> {
    let mut key: Option<String> = None;
    let mut alternatives: Vec<Value> = Vec::new();
    for child in children {
        let (k, value) = entry(child)?;
        if key.as_ref().is_some_and(|existing| *existing != k) {
            return None;
        }
        let Value::Array(values) = value else {
            return None;
        };
        key = Some(k);
        alternatives.extend(values);
    }
    key.map(|k| (k, Value::Array(alternatives)))
}

fn nil_values() -> Vec<Value> {
    vec![json!(""), json!(NIL_MARKER)]
}

/// Link leaves. "Like" is substring containment on the canonical link, which
/// no pattern operator expresses, so it has no pattern form. Negations admit
/// an absent field, as the evaluator does.
fn leaf_value(kind: LinkMatch, negated: bool, value: &str) -> Option<Value> {
    let nil = kind == LinkMatch::Nil || (kind == LinkMatch::Equals && is_nil_value(value));
    Some(match (nil, kind, negated) {
        (true, _, false) => {
            let mut alts = vec![json!({"exists": false})];
            alts.extend(nil_values());
            Value::Array(alts)
        }
        (true, _, true) => json!([{"anything-but": nil_values()}]),
        (false, LinkMatch::Like, _) => return None,
        (false, _, false) => json!([value]),
        (false, _, true) => json!([{"exists": false}, {"anything-but": [value]}]),
    })
}

/// Natural-language leaves. Equality is case-insensitive and name also reads
/// preferredUsername, so only the forms that never reject an accepted record
/// are rendered.
fn text_value(kind: TextMatch, negated: bool, value: &str) -> Option<Value> {
    match (kind, negated) {
        (TextMatch::Empty, false) => Some(json!([{"exists": false}, ""])),
        (TextMatch::Equals, true) => leaf_value(LinkMatch::Equals, true, value),
        _ => None,
    }
}

fn leaf_entry(check: &Check, negated: bool) -> Option<(String, Value)> {
    match check {
        Check::Link { field, kind, value } => {
            Some((field.key().to_string(), leaf_value(*kind, negated, value)?))
        }
        Check::Text { field, kind, value } => {
            Some((field.key().to_string(), text_value(*kind, negated, value)?))
        }
        Check::Type(types) => {
            let value = match (types.is_empty(), negated) {
                (true, false) => json!([{"exists": false}]),
                (true, true) => json!([{"exists": true}]),
                (false, false) => json!(types),
                (false, true) => json!([{"exists": false}, {"anything-but": types}]),
            };
            Some(("type".to_string(), value))
        }
        _ => None,
    }
}

// ============================================================================
// Compiled pattern
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum ValueMatcher {
    Exact(Value),
    Prefix(String),
    Exists(bool),
    AnythingBut(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
enum FieldPattern {
    Values(Vec<ValueMatcher>),
    Nested(Pattern),
}

/// A compiled, immutable pattern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    fields: Vec<(String, FieldPattern)>,
}

impl Pattern {
    pub fn compile(pattern: &Value) -> Result<Self, PatternError> {
        let Value::Object(map) = pattern else {
            return Err(PatternError::NotAnObject);
        };
        let mut fields = Vec::with_capacity(map.len());
        for (field, spec) in map {
            let compiled = match spec {
                Value::Object(_) => FieldPattern::Nested(Pattern::compile(spec)?),
                Value::Array(alts) if alts.is_empty() => {
                    return Err(PatternError::EmptyAlternatives(field.clone()))
                }
                Value::Array(alts) => FieldPattern::Values(
                    alts.iter()
                        .map(|alt| compile_matcher(field, alt))
                        .collect::<Result<_, _>>()?,
                ),
                literal => FieldPattern::Values(vec![ValueMatcher::Exact(literal.clone())]),
            };
            fields.push((field.clone(), compiled));
        }
        Ok(Self { fields })
    }

    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::compile(&value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, record: &Value) -> bool {
        match record {
            Value::Object(map) => self.matches_map(map),
            Value::String(link) => self.matches_map(&link_as_record(link)),
            _ => self.matches_map(&Map::new()),
        }
    }

    /// Decode and match a serialized record; undecodable input never matches.
    pub fn matches_slice(&self, raw: &[u8]) -> bool {
        match serde_json::from_slice::<Value>(raw) {
            Ok(record) => self.matches(&record),
            Err(err) => {
                debug!(%err, "record is not valid JSON");
                false
            }
        }
    }

    fn matches_map(&self, record: &Map<String, Value>) -> bool {
        self.fields.iter().all(|(field, pattern)| {
            let value = record.get(field).filter(|v| !v.is_null());
            match pattern {
                FieldPattern::Values(matchers) => matchers.iter().any(|m| m.matches(value)),
                FieldPattern::Nested(nested) => match value {
                    Some(Value::Array(values)) => values.iter().any(|v| nested.matches(v)),
                    Some(v) => nested.matches(v),
                    None => nested.matches_map(&Map::new()),
                },
            }
        })
    }
}

fn link_as_record(link: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("id".to_string(), Value::String(link.to_string()));
    map
}

fn compile_matcher(field: &str, alt: &Value) -> Result<ValueMatcher, PatternError> {
    let Value::Object(op) = alt else {
        return Ok(ValueMatcher::Exact(alt.clone()));
    };
    let bad = |operator: &str| PatternError::BadOperand {
        field: field.to_string(),
        operator: operator.to_string(),
    };
    let Some((operator, operand)) = op.iter().next().filter(|_| op.len() == 1) else {
        return Err(PatternError::UnknownOperator {
            field: field.to_string(),
            operator: op.keys().cloned().collect::<Vec<_>>().join(","),
        });
    };
    match operator.as_str() {
        "prefix" => operand
            .as_str()
            .map(|p| ValueMatcher::Prefix(p.to_string()))
            .ok_or_else(|| bad("prefix")),
        "exists" => operand
            .as_bool()
            .map(ValueMatcher::Exists)
            .ok_or_else(|| bad("exists")),
        "anything-but" => match operand {
            Value::Array(values) => Ok(ValueMatcher::AnythingBut(values.clone())),
            Value::String(_) | Value::Number(_) => Ok(ValueMatcher::AnythingBut(vec![operand.clone()])),
            _ => Err(bad("anything-but")),
        },
        other => Err(PatternError::UnknownOperator {
            field: field.to_string(),
            operator: other.to_string(),
        }),
    }
}

/// Scalar candidates of a record value: arrays flatten, embedded objects
/// stand in for their `id`.
fn candidates(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(values) => values.iter().flat_map(candidates).collect(),
        Value::Object(map) => map.get("id").into_iter().collect(),
        other => vec![other],
    }
}

impl ValueMatcher {
    fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return *self == ValueMatcher::Exists(false);
        };
        match self {
            ValueMatcher::Exists(exists) => *exists,
            ValueMatcher::Exact(want) => candidates(value).into_iter().any(|c| c == want),
            ValueMatcher::Prefix(prefix) => candidates(value)
                .into_iter()
                .any(|c| c.as_str().is_some_and(|s| s.starts_with(prefix.as_str()))),
            ValueMatcher::AnythingBut(excluded) => candidates(value)
                .into_iter()
                .any(|c| !excluded.contains(c)),
        }
    }
}

/// Build the pattern for `checks` and test one serialized record. A pattern
/// that fails to compile matches nothing.
pub fn matches_raw(checks: &Checks, raw: &[u8]) -> bool {
    match Pattern::compile(&build_pattern(checks)) {
        Ok(pattern) => pattern.matches_slice(raw),
        Err(err) => {
            debug!(%err, "pattern construction failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinkField;

    #[test]
    fn object_projection_with_nil_id() {
        let checks = Checks::new(vec![Check::object(vec![
            Check::has_type(["Note"]),
            Check::nil_id(),
        ])]);
        assert!(matches_raw(&checks, br#"{"object":{"type":"Note"}}"#));
        assert!(!matches_raw(
            &checks,
            br#"{"object":{"type":"Note","id":"https://example.com"}}"#
        ));
    }

    #[test]
    fn pattern_shape() {
        let checks = Checks::new(vec![
            Check::has_type(["Create", "Update"]),
            Check::not(Check::nil_id()),
            Check::actor(vec![Check::same_id("https://example.com/bob")]),
            Check::not(Check::has_type(["Delete"])),
        ]);
        assert_eq!(
            build_pattern(&checks),
            json!({
                "type": ["Create", "Update"],
                "id": [{"anything-but": ["", "-"]}],
                "actor": {"id": ["https://example.com/bob"]},
            })
        );
    }

    #[test]
    fn like_has_no_pattern_form() {
        let checks = Checks::from_query("id=~example.com&actor.id=~bob&name=~Bo");
        assert_eq!(build_pattern(&checks), json!({}));
        let record = br#"{"id":"https://example.com/1"}"#;
        assert!(matches_raw(&checks, record));
    }

    #[test]
    fn negated_equality_admits_absent_fields() {
        let checks = Checks::from_query("id=!https://a");
        assert_eq!(
            build_pattern(&checks),
            json!({"id": [{"exists": false}, {"anything-but": ["https://a"]}]})
        );
        assert!(matches_raw(&checks, br#"{"type":"Note"}"#));
        assert!(matches_raw(&checks, br#"{"id":"https://b"}"#));
        assert!(!matches_raw(&checks, br#"{"id":"https://a"}"#));

        let untyped = Checks::new(vec![Check::not(Check::has_type(["Note"]))]);
        assert!(matches_raw(&untyped, br#"{"id":"https://a"}"#));
        assert!(!matches_raw(&untyped, br#"{"type":"Note"}"#));
    }

    #[test]
    fn text_equality_is_left_to_the_evaluator() {
        let checks = Checks::from_query("name=bob");
        assert_eq!(build_pattern(&checks), json!({}));
        assert!(matches_raw(&checks, br#"{"preferredUsername":"Bob"}"#));
        assert_eq!(
            build_pattern(&Checks::from_query("content=")),
            json!({"content": [{"exists": false}, ""]})
        );
    }

    #[test]
    fn unsupported_checks_degenerate_to_match_all() {
        let checks = Checks::new(vec![
            Check::authorized("https://bob"),
            Check::recipients("https://bob"),
            Check::max_items(3),
        ]);
        assert_eq!(build_pattern(&checks), json!({}));
        assert!(matches_raw(&checks, br#"{"anything": 1}"#));
        assert!(!matches_raw(&checks, b"not json"));
    }

    #[test]
    fn string_links_stand_in_for_nested_objects() {
        let checks = Checks::new(vec![Check::actor(vec![Check::same_id("https://bob")])]);
        assert!(matches_raw(&checks, br#"{"actor":"https://bob"}"#));
        assert!(matches_raw(&checks, br#"{"actor":{"id":"https://bob"}}"#));
        assert!(!matches_raw(&checks, br#"{"actor":"https://alice"}"#));
    }

    #[test]
    fn alternatives_on_one_key_merge() {
        let checks = Checks::new(vec![Check::Any(vec![
            Check::same_id("https://a"),
            Check::nil_id(),
        ])]);
        assert_eq!(
            build_pattern(&checks),
            json!({"id": ["https://a", {"exists": false}, "", "-"]})
        );
        assert!(matches_raw(&checks, br#"{"type":"Note"}"#));
        assert!(!matches_raw(&checks, br#"{"id":"https://b"}"#));

        let mixed = Checks::new(vec![Check::Any(vec![
            Check::same_id("https://a"),
            Check::link(LinkField::Id, LinkMatch::Like, "b/"),
        ])]);
        assert_eq!(build_pattern(&mixed), json!({}));
    }

    #[test]
    fn prefix_operator_still_compiles() {
        let pattern = Pattern::parse(r#"{"id": [{"prefix": "https://b/"}]}"#).expect("compiles");
        assert!(pattern.matches(&json!({"id": "https://b/1"})));
        assert!(!pattern.matches(&json!({"id": "https://c/1"})));
    }

    #[test]
    fn malformed_patterns_are_errors() {
        assert!(Pattern::parse("[]").is_err());
        assert!(Pattern::parse(r#"{"id": []}"#).is_err());
        assert!(Pattern::parse(r#"{"id": [{"suffix": "x"}]}"#).is_err());
        assert!(Pattern::parse(r#"{"id": [{"exists": "yes"}]}"#).is_err());
        let ok = Pattern::parse(r#"{"to": ["https://www.w3.org/ns/activitystreams#Public"]}"#)
            .expect("compiles");
        assert!(ok.matches(&json!({"to": ["https://a", "https://www.w3.org/ns/activitystreams#Public"]})));
    }
}
