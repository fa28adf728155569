//! Predicate algebra over items.
//!
//! A [`Check`] is an immutable, closed set of predicate kinds. Every renderer
//! (query string, SQL, event pattern, index atoms) matches on the concrete
//! variant, so the set is an enum rather than a trait.
//!
//! Evaluation never fails: a check applied to an item of the wrong shape, or to
//! an absent item, is `false`. The exceptions are the identities of the
//! combinators (`All([])` is true, `Any([])` is false) and the "nil"/"empty"
//! leaves, which exist to match absence.

use apfilter_vocab::{canonicalize, is_nil_str, Item, Link, Object, Shape};
use percent_encoding::percent_decode_str;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Leaf discriminants
// ============================================================================

/// Link-valued properties a [`Check::Link`] can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkField {
    Id,
    Url,
    Context,
    InReplyTo,
    AttributedTo,
}

impl LinkField {
    pub const ALL: [LinkField; 5] = [
        LinkField::Id,
        LinkField::Url,
        LinkField::Context,
        LinkField::InReplyTo,
        LinkField::AttributedTo,
    ];

    pub fn key(self) -> &'static str {
        match self {
            LinkField::Id => "id",
            LinkField::Url => "url",
            LinkField::Context => "context",
            LinkField::InReplyTo => "inReplyTo",
            LinkField::AttributedTo => "attributedTo",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkMatch {
    Equals,
    Like,
    Nil,
}

/// Natural-language properties a [`Check::Text`] can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Name,
    PreferredUsername,
    Summary,
    Content,
}

impl TextField {
    pub const ALL: [TextField; 4] = [
        TextField::Name,
        TextField::PreferredUsername,
        TextField::Summary,
        TextField::Content,
    ];

    pub fn key(self) -> &'static str {
        match self {
            TextField::Name => "name",
            TextField::PreferredUsername => "preferredUsername",
            TextField::Summary => "summary",
            TextField::Content => "content",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Candidate values on `obj`. `name` also reads `preferredUsername` on
    /// actors.
    pub fn candidates<'a>(self, obj: &'a Object) -> Vec<&'a str> {
        match self {
            TextField::Name => {
                let mut out: Vec<&str> = obj.name.values().collect();
                if obj.shape() == Shape::Actor {
                    out.extend(obj.preferred_username.values());
                }
                out
            }
            TextField::PreferredUsername => obj.preferred_username.values().collect(),
            TextField::Summary => obj.summary.values().collect(),
            TextField::Content => obj.content.values().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextMatch {
    Equals,
    Like,
    Empty,
}

/// Sub-item a structural projection descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    Actor,
    Object,
    Target,
    Tag,
}

impl Projection {
    pub const ALL: [Projection; 4] = [
        Projection::Actor,
        Projection::Object,
        Projection::Target,
        Projection::Tag,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Projection::Actor => "actor",
            Projection::Object => "object",
            Projection::Target => "target",
            Projection::Tag => "tag",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

/// Pagination markers. They always match; [`crate::cursor::Cursor`] consumes
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    After(Link),
    Before(Link),
    MaxItems(usize),
}

// ============================================================================
// Check
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    Link {
        field: LinkField,
        kind: LinkMatch,
        value: String,
    },
    /// Type is one of the listed types; an empty list means "no type".
    Type(Vec<String>),
    Recipients(Link),
    /// Can the principal see the item.
    Authorized(Link),
    Text {
        field: TextField,
        kind: TextMatch,
        value: String,
    },
    Project(Projection, Vec<Check>),
    Not(Option<Box<Check>>),
    All(Vec<Check>),
    Any(Vec<Check>),
    Page(Page),
}

impl Check {
    pub fn link(field: LinkField, kind: LinkMatch, value: impl Into<String>) -> Self {
        Check::Link {
            field,
            kind,
            value: value.into(),
        }
    }

    pub fn same_id(id: impl Into<String>) -> Self {
        Self::link(LinkField::Id, LinkMatch::Equals, id)
    }

    pub fn id_like(fragment: impl Into<String>) -> Self {
        Self::link(LinkField::Id, LinkMatch::Like, fragment)
    }

    pub fn nil_id() -> Self {
        Self::link(LinkField::Id, LinkMatch::Nil, "")
    }

    pub fn has_type<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Check::Type(types.into_iter().map(Into::into).collect())
    }

    pub fn text(field: TextField, kind: TextMatch, value: impl Into<String>) -> Self {
        Check::Text {
            field,
            kind,
            value: value.into(),
        }
    }

    pub fn name_is(name: impl Into<String>) -> Self {
        Self::text(TextField::Name, TextMatch::Equals, name)
    }

    pub fn name_like(fragment: impl Into<String>) -> Self {
        Self::text(TextField::Name, TextMatch::Like, fragment)
    }

    pub fn name_empty() -> Self {
        Self::text(TextField::Name, TextMatch::Empty, "")
    }

    pub fn recipients(link: impl Into<Link>) -> Self {
        Check::Recipients(link.into())
    }

    pub fn authorized(principal: impl Into<Link>) -> Self {
        Check::Authorized(principal.into())
    }

    pub fn actor(checks: Vec<Check>) -> Self {
        Check::Project(Projection::Actor, checks)
    }

    pub fn object(checks: Vec<Check>) -> Self {
        Check::Project(Projection::Object, checks)
    }

    pub fn target(checks: Vec<Check>) -> Self {
        Check::Project(Projection::Target, checks)
    }

    pub fn tag(checks: Vec<Check>) -> Self {
        Check::Project(Projection::Tag, checks)
    }

    pub fn not(check: Check) -> Self {
        Check::Not(Some(Box::new(check)))
    }

    pub fn all(checks: Vec<Check>) -> Self {
        Check::All(checks)
    }

    pub fn any(checks: Vec<Check>) -> Self {
        Check::Any(checks)
    }

    pub fn after(link: impl Into<Link>) -> Self {
        Check::Page(Page::After(link.into()))
    }

    pub fn before(link: impl Into<Link>) -> Self {
        Check::Page(Page::Before(link.into()))
    }

    pub fn max_items(n: usize) -> Self {
        Check::Page(Page::MaxItems(n))
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.matches_opt(Some(item))
    }

    /// Evaluate against a possibly absent item.
    pub fn matches_opt(&self, item: Option<&Item>) -> bool {
        match self {
            Check::Link { field, kind, value } => {
                link_matches(*kind, value, link_target(*field, item))
            }
            Check::Type(types) => type_matches(types, item),
            Check::Recipients(link) => item
                .and_then(Item::as_object)
                .is_some_and(|obj| recipients_contain(obj, link.as_str())),
            Check::Authorized(principal) => item
                .and_then(Item::as_object)
                .is_some_and(|obj| authorized(obj, principal)),
            Check::Text { field, kind, value } => text_matches(*field, *kind, value, item),
            Check::Project(projection, checks) => project_matches(*projection, checks, item),
            Check::Not(None) => false,
            Check::Not(Some(inner)) => !inner.matches_opt(item),
            Check::All(checks) => checks.iter().all(|c| c.matches_opt(item)),
            Check::Any(checks) => checks.iter().any(|c| c.matches_opt(item)),
            Check::Page(_) => true,
        }
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Ordered, conjunctive list of checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checks(Vec<Check>);

impl Checks {
    pub fn new(checks: Vec<Check>) -> Self {
        Self(checks)
    }

    pub fn push(&mut self, check: Check) {
        self.0.push(check);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Check> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Check] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.0.iter().all(|c| c.matches(item))
    }

    /// Top-level pagination markers, in order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.0.iter().filter_map(|c| match c {
            Check::Page(page) => Some(page),
            _ => None,
        })
    }

    /// The counter bound, if any. The smallest one wins when repeated.
    pub fn max_items(&self) -> Option<usize> {
        self.pages()
            .filter_map(|p| match p {
                Page::MaxItems(n) => Some(*n),
                _ => None,
            })
            .min()
    }
}

impl From<Vec<Check>> for Checks {
    fn from(checks: Vec<Check>) -> Self {
        Self(checks)
    }
}

impl FromIterator<Check> for Checks {
    fn from_iter<T: IntoIterator<Item = Check>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Checks {
    type Item = Check;
    type IntoIter = std::vec::IntoIter<Check>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Checks {
    type Item = &'a Check;
    type IntoIter = std::slice::Iter<'a, Check>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Leaf evaluation
// ============================================================================

/// What a link check sees once the property has been read.
enum LinkTarget<'a> {
    Absent,
    One(&'a Link),
    List(&'a [Item]),
}

fn link_target(field: LinkField, item: Option<&Item>) -> LinkTarget<'_> {
    let Some(item) = item else {
        return LinkTarget::Absent;
    };
    if field == LinkField::Id {
        return target_of(item);
    }
    let Some(obj) = item.as_object() else {
        return LinkTarget::Absent;
    };
    let value = match field {
        LinkField::Id => None,
        LinkField::Url => obj.url.as_ref(),
        LinkField::Context => obj.context.as_ref(),
        LinkField::InReplyTo => obj.in_reply_to.as_ref(),
        LinkField::AttributedTo => obj.attributed_to.as_ref(),
    };
    value.map(target_of).unwrap_or(LinkTarget::Absent)
}

fn target_of(item: &Item) -> LinkTarget<'_> {
    match item {
        Item::Link(link) => LinkTarget::One(link),
        Item::Object(obj) => LinkTarget::One(&obj.id),
        Item::Collection(items) => LinkTarget::List(items),
    }
}

fn link_matches(kind: LinkMatch, value: &str, target: LinkTarget<'_>) -> bool {
    match kind {
        LinkMatch::Nil => match target {
            LinkTarget::Absent => true,
            LinkTarget::One(link) => link.is_nil(),
            LinkTarget::List(items) => items.is_empty(),
        },
        LinkMatch::Equals if value.is_empty() => matches!(target, LinkTarget::Absent),
        LinkMatch::Equals => any_link(target, |link| link.same_as(value)),
        LinkMatch::Like => {
            let needle = like_needle(value);
            any_link(target, |link| like_haystack(link.as_str()).contains(&needle))
        }
    }
}

fn any_link(target: LinkTarget<'_>, test: impl Fn(&Link) -> bool) -> bool {
    match target {
        LinkTarget::Absent => false,
        LinkTarget::One(link) => test(link),
        LinkTarget::List(items) => items
            .iter()
            .flat_map(Item::links)
            .any(|link| test(link)),
    }
}

fn type_matches(types: &[String], item: Option<&Item>) -> bool {
    match item {
        Some(Item::Collection(members)) => {
            types.is_empty() || members.iter().any(|m| type_matches(types, Some(m)))
        }
        Some(item) => match item.kind() {
            Some(kind) => types.iter().any(|t| t == kind),
            None => types.is_empty(),
        },
        None => types.is_empty(),
    }
}

fn recipients_contain(obj: &Object, link: &str) -> bool {
    obj.recipients()
        .flat_map(Item::links)
        .any(|r| r.same_as(link))
}

fn authorized(obj: &Object, principal: &Link) -> bool {
    let is_principal = |item: &Option<Item>| {
        item.as_ref()
            .is_some_and(|i| i.links().iter().any(|l| l.same_as(principal.as_str())))
    };
    if !principal.is_nil() && (is_principal(&obj.actor) || is_principal(&obj.attributed_to)) {
        return true;
    }
    obj.recipients().flat_map(Item::links).any(|r| {
        r.is_public() || (!principal.is_nil() && r.same_as(principal.as_str()))
    })
}

fn text_matches(field: TextField, kind: TextMatch, value: &str, item: Option<&Item>) -> bool {
    let candidates = item
        .and_then(Item::as_object)
        .map(|obj| field.candidates(obj))
        .unwrap_or_default();
    match kind {
        TextMatch::Empty => candidates.is_empty(),
        TextMatch::Equals => {
            let wanted = nfc(value).to_lowercase();
            candidates.iter().any(|c| nfc(c).to_lowercase() == wanted)
        }
        TextMatch::Like => {
            let needle = nfc(value);
            candidates.iter().any(|c| nfc(c).contains(&needle))
        }
    }
}

fn project_matches(projection: Projection, checks: &[Check], item: Option<&Item>) -> bool {
    let Some(obj) = item.and_then(Item::as_object) else {
        return false;
    };
    let all = |sub: Option<&Item>| checks.iter().all(|c| c.matches_opt(sub));
    match projection {
        Projection::Actor if obj.shape().has_actor() => all(obj.actor.as_ref()),
        Projection::Object if obj.shape() == Shape::Activity => all(obj.object.as_ref()),
        Projection::Target if obj.shape().has_actor() => all(obj.target.as_ref()),
        Projection::Tag if obj.tag.is_empty() => all(None),
        Projection::Tag => obj.tag.iter().any(|t| all(Some(t))),
        _ => false,
    }
}

pub(crate) fn nfc(s: &str) -> String {
    s.nfc().collect()
}

/// Percent-decoded, NFC-normalized pattern for "like" comparisons.
pub fn like_needle(pattern: &str) -> String {
    nfc(&percent_decode_str(pattern).decode_utf8_lossy())
}

/// The text a link "like" needle is searched in: the canonical link,
/// percent-decoded and NFC-normalized.
pub fn like_haystack(link: &str) -> String {
    like_needle(&canonicalize(link))
}

/// True when a raw value stands for "no value" in query strings and patterns.
pub(crate) fn is_nil_value(value: &str) -> bool {
    is_nil_str(value)
}
