//! Filter atoms and the bridge from check trees.
//!
//! Only checks with an exact per-field form become atoms. Everything else
//! (authorization, target/tag projections, mixed alternatives, pagination)
//! is left for the direct evaluator, so the atoms never exclude an item the
//! full check tree would accept.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use apfilter_core::{
    filter_items, Check, Checks, LinkField, LinkMatch, Projection, TextField, TextMatch,
};
use apfilter_vocab::{Item, Link};

use crate::config::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Union of the requested tokens.
    Equals,
    /// Union of every token containing a requested value.
    Like,
    /// Every known reference minus the union of the requested tokens.
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicFilter {
    pub field: Field,
    pub op: Operator,
    pub values: Vec<String>,
}

impl BasicFilter {
    pub fn new<I, S>(field: Field, op: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field,
            op,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn equals(field: Field, value: impl Into<String>) -> Self {
        Self::new(field, Operator::Equals, [value])
    }

    pub fn like(field: Field, value: impl Into<String>) -> Self {
        Self::new(field, Operator::Like, [value])
    }

    pub fn not(field: Field, value: impl Into<String>) -> Self {
        Self::new(field, Operator::Not, [value])
    }
}

/// Compile the index-expressible part of `checks` into conjunctive atoms.
pub fn filters_from_checks(checks: &Checks) -> Vec<BasicFilter> {
    let mut out = Vec::new();
    for check in checks {
        collect(check, &mut out);
    }
    out
}

/// Re-check index candidates against the full check tree.
///
/// `items` is the ordered source the index was built from; the candidates
/// keep that order, so pagination (`after`, `before`, `maxItems`) applies
/// exactly as it does in direct evaluation.
pub fn confirm_candidates(checks: &Checks, candidates: &[Link], items: &[Item]) -> Vec<Item> {
    let wanted: AHashSet<String> = candidates.iter().map(Link::canonical).collect();
    let kept: Vec<Item> = items
        .iter()
        .filter(|it| it.id().is_some_and(|id| wanted.contains(&id.canonical())))
        .cloned()
        .collect();
    debug!(candidates = candidates.len(), kept = kept.len(), "re-checking candidates");
    filter_items(checks, &kept)
}

fn collect(check: &Check, out: &mut Vec<BasicFilter>) {
    match check {
        Check::All(children) => {
            for child in children {
                collect(child, out);
            }
        }
        Check::Any(children) => match merge_alternatives(children) {
            Some(atom) => out.push(atom),
            None => debug!(?check, "alternatives span several fields, not indexed"),
        },
        other => match atom(other) {
            Some(atoms) => out.extend(atoms),
            None => debug!(?check, "no index form, skipping"),
        },
    }
}

/// `Any` over atoms of one field and operator is a single atom with the
/// values unioned.
fn merge_alternatives(children: &[Check]) -> Option<BasicFilter> {
    let mut merged: Option<BasicFilter> = None;
    for child in children {
        let mut atoms = atom(child)?;
        if atoms.len() != 1 {
            return None;
        }
        let next = atoms.pop()?;
        match merged.as_mut() {
            None => merged = Some(next),
            Some(m) if m.field == next.field && m.op == next.op && m.op != Operator::Not => {
                m.values.extend(next.values);
            }
            Some(_) => return None,
        }
    }
    merged
}

fn atom(check: &Check) -> Option<Vec<BasicFilter>> {
    match check {
        Check::Type(types) if !types.is_empty() => {
            Some(vec![BasicFilter::new(Field::Type, Operator::Equals, types.clone())])
        }
        Check::Recipients(link) if !link.is_nil() => {
            Some(vec![BasicFilter::equals(Field::Recipients, link.as_str())])
        }
        Check::Link { field, kind, value } => {
            let field = match field {
                LinkField::AttributedTo => Field::AttributedTo,
                LinkField::InReplyTo => Field::InReplyTo,
                _ => return None,
            };
            positive_link(field, *kind, value)
        }
        Check::Text { field, kind, value } => text_atoms(*field, *kind, value),
        Check::Project(projection @ (Projection::Actor | Projection::Object), inner) => {
            let field = match projection {
                Projection::Actor => Field::Actor,
                _ => Field::Object,
            };
            projected_ids(field, inner)
        }
        Check::Not(Some(inner)) => negated(inner),
        _ => None,
    }
}

fn positive_link(field: Field, kind: LinkMatch, value: &str) -> Option<Vec<BasicFilter>> {
    match kind {
        LinkMatch::Equals if !value.trim().is_empty() => {
            Some(vec![BasicFilter::equals(field, value)])
        }
        LinkMatch::Like if !value.is_empty() => Some(vec![BasicFilter::like(field, value)]),
        _ => None,
    }
}

/// Id checks inside an actor/object projection address the link-valued
/// field directly; any other check inside the projection makes it opaque.
fn projected_ids(field: Field, inner: &[Check]) -> Option<Vec<BasicFilter>> {
    let mut atoms = Vec::new();
    for check in inner {
        match check {
            Check::Link {
                field: LinkField::Id,
                kind,
                value,
            } => atoms.extend(positive_link(field, *kind, value)?),
            _ => return None,
        }
    }
    (!atoms.is_empty()).then_some(atoms)
}

fn index_field(field: TextField) -> Field {
    match field {
        TextField::Name | TextField::PreferredUsername => Field::Name,
        TextField::Summary => Field::Summary,
        TextField::Content => Field::Content,
    }
}

fn text_atoms(field: TextField, kind: TextMatch, value: &str) -> Option<Vec<BasicFilter>> {
    if value.trim().is_empty() {
        return None;
    }
    let target = index_field(field);
    match kind {
        TextMatch::Equals if !target.is_word_valued() => {
            Some(vec![BasicFilter::equals(target, value)])
        }
        TextMatch::Like => Some(vec![BasicFilter::like(target, value)]),
        _ => None,
    }
}

fn negated(inner: &Check) -> Option<Vec<BasicFilter>> {
    match inner {
        Check::Type(types) if !types.is_empty() => {
            Some(vec![BasicFilter::new(Field::Type, Operator::Not, types.clone())])
        }
        Check::Link {
            field: field @ (LinkField::AttributedTo | LinkField::InReplyTo),
            kind: LinkMatch::Equals,
            value,
        } if !value.trim().is_empty() => {
            let field = match field {
                LinkField::AttributedTo => Field::AttributedTo,
                _ => Field::InReplyTo,
            };
            Some(vec![BasicFilter::not(field, value.as_str())])
        }
        _ => None,
    }
}
