//! Token extraction, one function per indexed field.
//!
//! Tokens are normalized the same way on ingest and on lookup:
//! - links: canonical form (see `apfilter_vocab::canonicalize`)
//! - names: NFC, trimmed, lowercased, one token per value
//! - summary/content: markup stripped, NFC, segmented into lowercase words
//! - type: verbatim

use std::collections::BTreeSet;

use apfilter_core::like_needle;
use apfilter_vocab::{canonicalize, is_nil_str, Item, Object};
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{Field, IndexConfig};
use crate::error::ExtractError;
use crate::filter::Operator;

/// Distinct tokens `item` contributes to `field`.
pub fn extract(field: Field, item: &Item, config: &IndexConfig) -> Result<Vec<String>, ExtractError> {
    let obj = match item {
        Item::Object(obj) => obj.as_ref(),
        Item::Link(_) => return Err(ExtractError::new(field, "item is a bare link")),
        Item::Collection(_) => return Err(ExtractError::new(field, "item is a bare list")),
    };
    let tokens: BTreeSet<String> = match field {
        Field::Type => {
            let kind = obj.kind.trim();
            if kind.is_empty() {
                BTreeSet::new()
            } else {
                BTreeSet::from([kind.to_string()])
            }
        }
        Field::Name => obj
            .name
            .values()
            .chain(obj.preferred_username.values())
            .map(normalize_text)
            .filter(|t| !t.is_empty())
            .collect(),
        Field::Summary => obj
            .summary
            .values()
            .flat_map(|v| words(v, config.min_word_len))
            .collect(),
        Field::Content => obj
            .content
            .values()
            .flat_map(|v| words(v, config.min_word_len))
            .collect(),
        Field::Actor => link_tokens(obj.actor.as_ref()),
        Field::Object => link_tokens(obj.object.as_ref()),
        Field::AttributedTo => link_tokens(obj.attributed_to.as_ref()),
        Field::InReplyTo => link_tokens(obj.in_reply_to.as_ref()),
        Field::Recipients => recipient_tokens(obj),
    };
    Ok(tokens.into_iter().collect())
}

/// Normalize a lookup value for `field` the way [`extract`] normalizes
/// stored tokens. Word-valued fields yield one token per word; "like"
/// needles keep short words, and link needles are percent-decoded instead of
/// canonicalized (see [`searchable_text`]).
pub fn normalize_lookup(field: Field, op: Operator, value: &str, config: &IndexConfig) -> Vec<String> {
    match (field, op) {
        (Field::Type, _) => vec![value.trim().to_string()],
        (Field::Name, _) => vec![normalize_text(value)],
        (Field::Summary | Field::Content, Operator::Like) => words(value, 1),
        (Field::Summary | Field::Content, _) => words(value, config.min_word_len),
        (_, Operator::Like) => vec![like_needle(value).to_lowercase()],
        _ if is_nil_str(value) => Vec::new(),
        _ => vec![canonicalize(value)],
    }
}

/// The text a "like" needle is searched in for a stored token. Link tokens
/// are canonical, so they are percent-decoded back into the space
/// [`normalize_lookup`] puts needles in.
pub(crate) fn searchable_text(field: Field, token: &str) -> String {
    if field.is_link_valued() {
        like_needle(token).to_lowercase()
    } else {
        token.to_lowercase()
    }
}

fn link_tokens(item: Option<&Item>) -> BTreeSet<String> {
    item.map(|it| it.links().into_iter().map(|l| l.canonical()).collect())
        .unwrap_or_default()
}

fn recipient_tokens(obj: &Object) -> BTreeSet<String> {
    obj.recipients()
        .flat_map(|r| r.links())
        .map(|l| l.canonical())
        .collect()
}

pub(crate) fn normalize_text(raw: &str) -> String {
    raw.trim().nfc().collect::<String>().to_lowercase()
}

/// Lowercase words of `raw` after markup removal.
pub fn words(raw: &str, min_len: usize) -> Vec<String> {
    let text: String = strip_markup(raw).nfc().collect();
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= min_len)
        .collect()
}

/// Drop `<...>` tags, leaving a space so adjacent words stay apart.
fn strip_markup(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use apfilter_vocab::{Link, NaturalLanguageValues};

    fn note() -> Item {
        let mut obj = Object::new("https://example.com/1", "Note");
        obj.name = NaturalLanguageValues::und("Hello World");
        obj.content = NaturalLanguageValues::und("<p>The <b>quick</b> fox, a fox!</p>");
        obj.attributed_to = Some(Item::link("https://Example.com/bob/"));
        obj.to = vec![Item::link(Link::public())];
        obj.cc = vec![Item::Collection(vec![
            Item::link("https://example.com/alice"),
            Item::link("-"),
        ])];
        Item::object(obj)
    }

    #[test]
    fn content_words_skip_markup_and_short_words() {
        let tokens = extract(Field::Content, &note(), &IndexConfig::default()).unwrap();
        assert_eq!(tokens, vec!["fox", "quick", "the"]);
    }

    #[test]
    fn names_are_whole_lowercased_values() {
        let tokens = extract(Field::Name, &note(), &IndexConfig::default()).unwrap();
        assert_eq!(tokens, vec!["hello world"]);
    }

    #[test]
    fn link_fields_store_canonical_links() {
        let cfg = IndexConfig::default();
        assert_eq!(
            extract(Field::AttributedTo, &note(), &cfg).unwrap(),
            vec!["https://example.com/bob"]
        );
        assert_eq!(
            extract(Field::Recipients, &note(), &cfg).unwrap(),
            vec![
                "https://example.com/alice".to_string(),
                "https://www.w3.org/ns/activitystreams#Public".to_string(),
            ]
        );
        assert!(extract(Field::Actor, &note(), &cfg).unwrap().is_empty());
    }

    #[test]
    fn non_objects_fail_extraction() {
        let err = extract(Field::Type, &Item::link("https://x"), &IndexConfig::default())
            .unwrap_err();
        assert_eq!(err.field, Field::Type);
    }

    #[test]
    fn lookups_normalize_like_ingest() {
        let cfg = IndexConfig::default();
        assert_eq!(
            normalize_lookup(Field::Name, Operator::Equals, " Hello World ", &cfg),
            vec!["hello world"]
        );
        assert_eq!(
            normalize_lookup(Field::Actor, Operator::Equals, "HTTPS://EXAMPLE.com/bob/", &cfg),
            vec!["https://example.com/bob"]
        );
        assert!(normalize_lookup(Field::Actor, Operator::Not, "-", &cfg).is_empty());
        assert_eq!(
            normalize_lookup(Field::Content, Operator::Like, "a Fox", &cfg),
            vec!["a", "fox"]
        );
        assert_eq!(
            normalize_lookup(Field::Actor, Operator::Like, "Example.COM", &cfg),
            vec!["example.com"]
        );
        assert_eq!(
            normalize_lookup(Field::AttributedTo, Operator::Like, "CAF%C3%A9", &cfg),
            vec!["caf\u{e9}"]
        );
    }

    #[test]
    fn link_tokens_are_searched_decoded() {
        let mut obj = Object::new("https://ex.com/n/1", "Note");
        obj.attributed_to = Some(Item::link("https://ex.com/users/caf\u{e9}"));
        let stored = extract(Field::AttributedTo, &Item::object(obj), &IndexConfig::default())
            .unwrap();
        assert_eq!(stored, vec!["https://ex.com/users/caf%C3%A9"]);
        assert_eq!(
            searchable_text(Field::AttributedTo, &stored[0]),
            "https://ex.com/users/caf\u{e9}"
        );
        assert_eq!(searchable_text(Field::Name, "Caf%C3%A9"), "caf%c3%a9");
    }
}
