//! Relational rendering: WHERE sub-clauses plus positional values.
//!
//! The target table exposes `iri`, `type` and `url` columns and a JSON
//! payload column (`raw`) addressed with `json_extract`. Every literal is a
//! `?` placeholder; `values` lines up with the placeholders in clause order.
//!
//! Checks sharing a field are OR-ed into one clause; clauses are meant to be
//! AND-ed by the caller. Checks with no relational form (projections,
//! recipients, authorization, pagination) are skipped, which only widens the
//! selection.

use tracing::debug;

use crate::check::{
    is_nil_value, like_needle, nfc, Check, Checks, LinkField, LinkMatch, TextField, TextMatch,
};

pub const RAW_COLUMN: &str = "raw";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlWhere {
    pub clauses: Vec<String>,
    pub values: Vec<String>,
}

impl SqlWhere {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Join the clauses with `sep` (typically `" AND "`).
    pub fn join(&self, sep: &str) -> String {
        self.clauses.join(sep)
    }
}

/// Where a field lives in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Plain(&'static str),
    Json(&'static str),
}

impl Column {
    fn expr(self) -> String {
        match self {
            Column::Plain(name) => name.to_string(),
            Column::Json(path) => format!("json_extract(\"{RAW_COLUMN}\", '$.{path}')"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKey {
    Link(LinkField),
    Type,
    Text(TextField),
}

struct Fragment {
    sql: String,
    values: Vec<String>,
}

fn link_column(field: LinkField) -> Column {
    match field {
        LinkField::Id => Column::Plain("iri"),
        LinkField::Url => Column::Plain("url"),
        LinkField::Context => Column::Json("context"),
        LinkField::InReplyTo => Column::Json("inReplyTo"),
        LinkField::AttributedTo => Column::Json("attributedTo"),
    }
}

fn text_columns(field: TextField) -> &'static [Column] {
    match field {
        TextField::Name => &[Column::Json("name"), Column::Json("preferredUsername")],
        TextField::PreferredUsername => &[Column::Json("preferredUsername")],
        TextField::Summary => &[Column::Json("summary")],
        TextField::Content => &[Column::Json("content")],
    }
}

/// `expr <op> ?` for one column.
fn compare(column: Column, kind: LinkMatch, negated: bool, value: &str) -> Fragment {
    let expr = column.expr();
    let nil = kind == LinkMatch::Nil || (kind == LinkMatch::Equals && is_nil_value(value));
    if nil {
        let op = if negated { "IS NOT NULL" } else { "IS NULL" };
        return Fragment {
            sql: format!("{expr} {op}"),
            values: Vec::new(),
        };
    }
    let (op, value) = match (kind, negated) {
        (LinkMatch::Like, false) => ("LIKE", format!("%{value}%")),
        (LinkMatch::Like, true) => ("NOT LIKE", format!("%{value}%")),
        (_, false) => ("=", value.to_string()),
        (_, true) => ("!=", value.to_string()),
    };
    Fragment {
        sql: if negated {
            // An absent value satisfies every negation.
            format!("({expr} IS NULL OR {expr} {op} ?)")
        } else {
            format!("{expr} {op} ?")
        },
        values: vec![value],
    }
}

/// A negated type set must exclude every member, so it is one fragment
/// rather than one `!=` per type.
fn type_excluded(types: &[String]) -> Fragment {
    let expr = Column::Plain("type").expr();
    let marks = vec!["?"; types.len()].join(", ");
    Fragment {
        sql: format!("({expr} IS NULL OR {expr} NOT IN ({marks}))"),
        values: types.to_vec(),
    }
}

/// One fragment per check; multi-column text fields OR their columns.
fn leaf_fragment(check: &Check, negated: bool) -> Option<(GroupKey, Vec<Fragment>)> {
    match check {
        Check::Link { field, kind, value } => {
            let value = match kind {
                LinkMatch::Like => like_needle(value),
                _ => value.clone(),
            };
            let frag = compare(link_column(*field), *kind, negated, &value);
            Some((GroupKey::Link(*field), vec![frag]))
        }
        Check::Type(types) if types.is_empty() => Some((
            GroupKey::Type,
            vec![compare(Column::Plain("type"), LinkMatch::Nil, negated, "")],
        )),
        Check::Type(types) if negated => Some((GroupKey::Type, vec![type_excluded(types)])),
        Check::Type(types) => Some((
            GroupKey::Type,
            types
                .iter()
                .map(|t| compare(Column::Plain("type"), LinkMatch::Equals, false, t))
                .collect(),
        )),
        Check::Text { field, kind, value } => {
            let kind = match kind {
                TextMatch::Equals => LinkMatch::Equals,
                TextMatch::Like => LinkMatch::Like,
                TextMatch::Empty => LinkMatch::Nil,
            };
            let value = nfc(value);
            let parts: Vec<Fragment> = text_columns(*field)
                .iter()
                .map(|col| compare(*col, kind, negated, &value))
                .collect();
            // Negated multi-column checks must hold on every column.
            let joiner = if negated { " AND " } else { " OR " };
            let frag = if parts.len() == 1 {
                parts.into_iter().next()?
            } else {
                Fragment {
                    sql: format!(
                        "({})",
                        parts
                            .iter()
                            .map(|p| p.sql.as_str())
                            .collect::<Vec<_>>()
                            .join(joiner)
                    ),
                    values: parts.into_iter().flat_map(|p| p.values).collect(),
                }
            };
            Some((GroupKey::Text(*field), vec![frag]))
        }
        _ => None,
    }
}

fn collect(check: &Check, groups: &mut Vec<(GroupKey, Vec<Fragment>)>) {
    let found = match check {
        Check::All(children) | Check::Any(children) => {
            for child in children {
                collect(child, groups);
            }
            return;
        }
        Check::Not(Some(inner)) => leaf_fragment(inner, true),
        other => leaf_fragment(other, false),
    };
    let Some((key, frags)) = found else {
        debug!(?check, "no relational form, skipping");
        return;
    };
    match groups.iter_mut().find(|(k, _)| *k == key) {
        Some((_, existing)) => existing.extend(frags),
        None => groups.push((key, frags)),
    }
}

pub fn sql_where(checks: &Checks) -> SqlWhere {
    let mut groups: Vec<(GroupKey, Vec<Fragment>)> = Vec::new();
    for check in checks {
        collect(check, &mut groups);
    }

    let mut out = SqlWhere::default();
    for (_, frags) in groups {
        let clause = if frags.len() == 1 {
            frags[0].sql.clone()
        } else {
            format!(
                "({})",
                frags
                    .iter()
                    .map(|f| f.sql.as_str())
                    .collect::<Vec<_>>()
                    .join(" OR ")
            )
        };
        out.clauses.push(clause);
        out.values.extend(frags.into_iter().flat_map(|f| f.values));
    }
    out
}

/// The counter bound, or -1 when unbounded.
pub fn sql_limit(checks: &Checks) -> i64 {
    checks
        .max_items()
        .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_or_ed_and_parameterized() {
        let checks = Checks::new(vec![Check::Any(vec![
            Check::same_id("https://a"),
            Check::id_like("b"),
        ])]);
        let w = sql_where(&checks);
        assert_eq!(w.clauses, vec!["(iri = ? OR iri LIKE ?)"]);
        assert_eq!(w.values, vec!["https://a", "%b%"]);
    }

    #[test]
    fn nil_and_negations() {
        let checks = Checks::new(vec![
            Check::not(Check::nil_id()),
            Check::Type(Vec::new()),
            Check::not(Check::link(LinkField::Context, LinkMatch::Like, "x")),
        ]);
        let w = sql_where(&checks);
        assert_eq!(
            w.clauses,
            vec![
                "iri IS NOT NULL",
                "type IS NULL",
                "(json_extract(\"raw\", '$.context') IS NULL OR json_extract(\"raw\", '$.context') NOT LIKE ?)",
            ]
        );
        assert_eq!(w.values, vec!["%x%"]);
    }

    #[test]
    fn negated_type_set_excludes_every_member() {
        let w = sql_where(&Checks::new(vec![Check::not(Check::has_type([
            "Note", "Article",
        ]))]));
        assert_eq!(w.clauses, vec!["(type IS NULL OR type NOT IN (?, ?))"]);
        assert_eq!(w.values, vec!["Note", "Article"]);

        let note = apfilter_vocab::Item::object(apfilter_vocab::Object::new("https://x", "Note"));
        assert!(!Check::not(Check::has_type(["Note", "Article"])).matches(&note));
    }

    #[test]
    fn negated_equality_keeps_absent_values() {
        let w = sql_where(&Checks::new(vec![Check::not(Check::link(
            LinkField::InReplyTo,
            LinkMatch::Equals,
            "https://a",
        ))]));
        assert_eq!(
            w.join(" AND "),
            "(json_extract(\"raw\", '$.inReplyTo') IS NULL OR json_extract(\"raw\", '$.inReplyTo') != ?)"
        );
        assert_eq!(w.values, vec!["https://a"]);
    }

    #[test]
    fn name_reads_preferred_username_too() {
        let w = sql_where(&Checks::new(vec![Check::name_is("bob")]));
        assert_eq!(
            w.join(" AND "),
            "(json_extract(\"raw\", '$.name') = ? OR json_extract(\"raw\", '$.preferredUsername') = ?)"
        );
        assert_eq!(w.values, vec!["bob", "bob"]);
    }

    #[test]
    fn types_group_and_unsupported_checks_vanish() {
        let checks = Checks::new(vec![
            Check::has_type(["Note", "Article"]),
            Check::actor(vec![Check::same_id("https://bob")]),
            Check::authorized("https://bob"),
        ]);
        let w = sql_where(&checks);
        assert_eq!(w.clauses, vec!["(type = ? OR type = ?)"]);
        assert_eq!(w.values, vec!["Note", "Article"]);

        let none = sql_where(&Checks::new(vec![Check::recipients("https://bob")]));
        assert!(none.is_empty());
        assert!(none.values.is_empty());
    }

    #[test]
    fn limit_defaults_to_unbounded() {
        assert_eq!(sql_limit(&Checks::default()), -1);
        assert_eq!(sql_limit(&Checks::new(vec![Check::max_items(15)])), 15);
    }
}
