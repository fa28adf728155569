//! Query-string codec.
//!
//! ```text
//! id=https://example.com/1          same id
//! id=~example.com                   id contains
//! id=!-                             id is not nil
//! type=Note&type=Article            type is Note OR Article
//! object.type=Note&actor.name=~bob  structural projections
//! maxItems=20&after=https://...     pagination
//! ```
//!
//! Operator prefixes: `!` negates, `~` is "like", `!~` is "not like". An empty
//! value (or `-`) stands for nil. Repeated keys are OR-ed, distinct keys are
//! AND-ed. Unknown keys are dropped.

use tracing::debug;
use url::form_urlencoded;

use crate::check::{is_nil_value, Check, Checks, LinkField, LinkMatch, Page, Projection};
use crate::check::{TextField, TextMatch};

pub const KEY_TYPE: &str = "type";
pub const KEY_RECIPIENTS: &str = "recipients";
pub const KEY_AUTHORIZED: &str = "authorized";
pub const KEY_AFTER: &str = "after";
pub const KEY_BEFORE: &str = "before";
pub const KEY_MAX_ITEMS: &str = "maxItems";

impl Checks {
    pub fn from_query(query: &str) -> Self {
        parse_query(query)
    }

    pub fn to_query(&self) -> String {
        encode_query(self)
    }
}

// ============================================================================
// Parsing
// ============================================================================

pub fn parse_query(query: &str) -> Checks {
    let query = query.strip_prefix('?').unwrap_or(query);
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    Checks::new(checks_from_pairs(&pairs))
}

enum Group {
    Field(String, Vec<String>),
    Nested(Projection, Vec<(String, String)>),
}

fn checks_from_pairs(pairs: &[(String, String)]) -> Vec<Check> {
    let mut groups: Vec<Group> = Vec::new();
    for (key, value) in pairs {
        let (head, rest) = match key.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (key.as_str(), None),
        };
        if let Some(projection) = Projection::from_key(head) {
            let sub = (rest.unwrap_or("id").to_string(), value.clone());
            let pos = groups
                .iter()
                .position(|g| matches!(g, Group::Nested(p, _) if *p == projection));
            match pos.map(|i| &mut groups[i]) {
                Some(Group::Nested(_, subs)) => subs.push(sub),
                _ => groups.push(Group::Nested(projection, vec![sub])),
            }
            continue;
        }
        let pos = groups
            .iter()
            .position(|g| matches!(g, Group::Field(k, _) if k == key));
        match pos.map(|i| &mut groups[i]) {
            Some(Group::Field(_, values)) => values.push(value.clone()),
            _ => groups.push(Group::Field(key.clone(), vec![value.clone()])),
        }
    }

    let mut out = Vec::new();
    for group in groups {
        match group {
            Group::Nested(projection, subs) => {
                out.push(Check::Project(projection, checks_from_pairs(&subs)));
            }
            Group::Field(key, values) => out.extend(field_checks(&key, &values)),
        }
    }
    out
}

fn field_checks(key: &str, values: &[String]) -> Vec<Check> {
    match key {
        KEY_AFTER | KEY_BEFORE => values
            .iter()
            .filter(|v| !is_nil_value(v))
            .map(|v| match key {
                KEY_AFTER => Check::after(v.as_str()),
                _ => Check::before(v.as_str()),
            })
            .collect(),
        KEY_MAX_ITEMS => values
            .iter()
            .filter_map(|v| match v.trim().parse::<usize>() {
                Ok(n) => Some(Check::max_items(n)),
                Err(_) => {
                    debug!(value = %v, "dropping unparseable maxItems");
                    None
                }
            })
            .collect(),
        _ => {
            let mut alternatives: Vec<Check> = Vec::new();
            let mut types: Vec<String> = Vec::new();
            let mut untyped = false;
            for value in values {
                let (negated, kind, value) = split_operator(value);
                if key == KEY_TYPE && !negated {
                    match kind {
                        LinkMatch::Nil => untyped = true,
                        _ => types.push(value.to_string()),
                    }
                    continue;
                }
                let Some(check) = value_check(key, kind, value) else {
                    debug!(key, "dropping unknown query key");
                    return Vec::new();
                };
                alternatives.push(if negated { Check::not(check) } else { check });
            }
            // Named types share one membership check; a nil type is its own
            // alternative since `Type([])` only matches untyped items.
            let mut type_checks = Vec::new();
            if !types.is_empty() {
                type_checks.push(Check::Type(types));
            }
            if untyped {
                type_checks.push(Check::Type(Vec::new()));
            }
            alternatives.splice(0..0, type_checks);
            match alternatives.len() {
                0 => Vec::new(),
                1 => alternatives,
                _ => vec![Check::Any(alternatives)],
            }
        }
    }
}

fn split_operator(raw: &str) -> (bool, LinkMatch, &str) {
    let (negated, rest) = match raw.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    match rest.strip_prefix('~') {
        Some(fragment) => (negated, LinkMatch::Like, fragment),
        None if is_nil_value(rest) => (negated, LinkMatch::Nil, ""),
        None => (negated, LinkMatch::Equals, rest),
    }
}

fn value_check(key: &str, kind: LinkMatch, value: &str) -> Option<Check> {
    if let Some(field) = LinkField::from_key(key) {
        return Some(Check::link(field, kind, value));
    }
    if let Some(field) = TextField::from_key(key) {
        let kind = match kind {
            LinkMatch::Equals => TextMatch::Equals,
            LinkMatch::Like => TextMatch::Like,
            LinkMatch::Nil => TextMatch::Empty,
        };
        return Some(Check::text(field, kind, value));
    }
    match key {
        KEY_TYPE => Some(match kind {
            LinkMatch::Nil => Check::Type(Vec::new()),
            _ => Check::has_type([value]),
        }),
        KEY_RECIPIENTS => Some(Check::recipients(value)),
        KEY_AUTHORIZED => Some(Check::authorized(value)),
        _ => None,
    }
}

// ============================================================================
// Encoding
// ============================================================================

pub fn encode_query(checks: &Checks) -> String {
    let mut pairs = Vec::new();
    for check in checks {
        pairs_of(None, check, &mut pairs);
    }
    let mut ser = form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        ser.append_pair(k, v);
    }
    ser.finish()
}

fn prefixed(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(p) => format!("{p}.{key}"),
        None => key.to_string(),
    }
}

fn operator_value(negated: bool, kind: LinkMatch, value: &str) -> String {
    let bang = if negated { "!" } else { "" };
    match kind {
        LinkMatch::Equals => format!("{bang}{value}"),
        LinkMatch::Like => format!("{bang}~{value}"),
        LinkMatch::Nil => format!("{bang}-"),
    }
}

fn text_as_link(kind: TextMatch) -> LinkMatch {
    match kind {
        TextMatch::Equals => LinkMatch::Equals,
        TextMatch::Like => LinkMatch::Like,
        TextMatch::Empty => LinkMatch::Nil,
    }
}

/// Render one leaf as `(key, value)`, with the negation marker when asked.
fn leaf_pair(prefix: Option<&str>, check: &Check, negated: bool) -> Option<Vec<(String, String)>> {
    let one = |key: &str, value: String| Some(vec![(prefixed(prefix, key), value)]);
    match check {
        Check::Link { field, kind, value } => one(field.key(), operator_value(negated, *kind, value)),
        Check::Text { field, kind, value } => {
            one(field.key(), operator_value(negated, text_as_link(*kind), value))
        }
        Check::Type(types) if types.is_empty() => {
            one(KEY_TYPE, operator_value(negated, LinkMatch::Nil, ""))
        }
        Check::Type(types) => Some(
            types
                .iter()
                .map(|t| {
                    (
                        prefixed(prefix, KEY_TYPE),
                        operator_value(negated, LinkMatch::Equals, t),
                    )
                })
                .collect(),
        ),
        Check::Recipients(link) => one(
            KEY_RECIPIENTS,
            operator_value(negated, LinkMatch::Equals, link.as_str()),
        ),
        Check::Authorized(link) => one(
            KEY_AUTHORIZED,
            operator_value(negated, LinkMatch::Equals, link.as_str()),
        ),
        _ => None,
    }
}

fn pairs_of(prefix: Option<&str>, check: &Check, out: &mut Vec<(String, String)>) {
    match check {
        Check::Project(projection, checks) => {
            let nested = prefixed(prefix, projection.key());
            for c in checks {
                pairs_of(Some(&nested), c, out);
            }
        }
        Check::All(checks) | Check::Any(checks) => {
            for c in checks {
                pairs_of(prefix, c, out);
            }
        }
        Check::Not(Some(inner)) => match leaf_pair(prefix, inner, true) {
            Some(pairs) => out.extend(pairs),
            None => debug!(?inner, "negation has no query-string form"),
        },
        Check::Not(None) => {}
        Check::Page(page) if prefix.is_none() => match page {
            Page::After(link) => out.push((KEY_AFTER.into(), link.as_str().into())),
            Page::Before(link) => out.push((KEY_BEFORE.into(), link.as_str().into())),
            Page::MaxItems(n) => out.push((KEY_MAX_ITEMS.into(), n.to_string())),
        },
        Check::Page(_) => {}
        leaf => {
            if let Some(pairs) = leaf_pair(prefix, leaf, false) {
                out.extend(pairs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(qs: &str) -> Vec<(String, String)> {
        form_urlencoded::parse(qs.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn id_roundtrips() {
        let checks = Checks::from_query("id=https://example.com");
        assert_eq!(checks.as_slice(), &[Check::same_id("https://example.com")]);
        assert_eq!(
            pairs(&checks.to_query()),
            vec![("id".to_string(), "https://example.com".to_string())]
        );
    }

    #[test]
    fn operator_prefixes() {
        let checks = Checks::from_query("id=!-&name=~bob&url=!~spam&content=");
        assert_eq!(
            checks.as_slice(),
            &[
                Check::not(Check::nil_id()),
                Check::name_like("bob"),
                Check::not(Check::link(LinkField::Url, LinkMatch::Like, "spam")),
                Check::text(TextField::Content, TextMatch::Empty, ""),
            ]
        );
    }

    #[test]
    fn repeated_keys_are_alternatives() {
        let checks = Checks::from_query("type=Note&type=Article&id=https://a&id=https://b");
        assert_eq!(
            checks.as_slice(),
            &[
                Check::has_type(["Note", "Article"]),
                Check::Any(vec![Check::same_id("https://a"), Check::same_id("https://b")]),
            ]
        );
    }

    #[test]
    fn dotted_keys_become_projections() {
        let checks = Checks::from_query("object.type=Note&actor=https://bob&object.id=");
        assert_eq!(
            checks.as_slice(),
            &[
                Check::object(vec![Check::has_type(["Note"]), Check::nil_id()]),
                Check::actor(vec![Check::same_id("https://bob")]),
            ]
        );
        let again = Checks::from_query(&checks.to_query());
        assert_eq!(again, checks);
    }

    #[test]
    fn pagination_keys_and_bad_values() {
        let checks = Checks::from_query("maxItems=abc&after=https://x/1&bogus=1");
        assert_eq!(checks.as_slice(), &[Check::after("https://x/1")]);
        assert_eq!(checks.max_items(), None);
        assert_eq!(Checks::from_query("maxItems=20").max_items(), Some(20));
    }

    #[test]
    fn nil_type_is_an_alternative_to_named_types() {
        let checks = Checks::from_query("type=Note&type=-");
        assert_eq!(
            checks.as_slice(),
            &[Check::Any(vec![
                Check::has_type(["Note"]),
                Check::Type(Vec::new()),
            ])]
        );
        let untyped = apfilter_vocab::Item::object(apfilter_vocab::Object::new("https://x", ""));
        assert!(checks.matches(&untyped));
        assert_eq!(Checks::from_query(&checks.to_query()), checks);
    }

    #[test]
    fn negated_type_and_empty_type() {
        let checks = Checks::from_query("type=!Note");
        assert_eq!(checks.as_slice(), &[Check::not(Check::has_type(["Note"]))]);
        let checks = Checks::from_query("type=");
        assert_eq!(checks.as_slice(), &[Check::Type(Vec::new())]);
        assert_eq!(pairs(&checks.to_query()), vec![("type".into(), "-".into())]);
    }
}
