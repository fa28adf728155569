//! Items: links, objects and bare item lists.

use crate::link::Link;
use crate::natural_language::NaturalLanguageValues;

// ============================================================================
// Type vocabulary
// ============================================================================

pub const ACTOR_TYPES: &[&str] = &["Application", "Group", "Organization", "Person", "Service"];

pub const INTRANSITIVE_ACTIVITY_TYPES: &[&str] = &["Arrive", "Question", "Travel"];

pub const ACTIVITY_TYPES: &[&str] = &[
    "Accept",
    "Add",
    "Announce",
    "Block",
    "Create",
    "Delete",
    "Dislike",
    "Flag",
    "Follow",
    "Ignore",
    "Invite",
    "Join",
    "Leave",
    "Like",
    "Listen",
    "Move",
    "Offer",
    "Read",
    "Reject",
    "Remove",
    "TentativeAccept",
    "TentativeReject",
    "Undo",
    "Update",
    "View",
    "Activity",
];

pub const ORDERED_COLLECTION_TYPES: &[&str] = &["OrderedCollection", "OrderedCollectionPage"];

pub const COLLECTION_TYPES: &[&str] = &["Collection", "CollectionPage"];

/// Structural shape of an object, derived from its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    Actor,
    Activity,
    IntransitiveActivity,
    Collection,
    OrderedCollection,
}

impl Shape {
    pub fn of_type(kind: &str) -> Self {
        if ACTIVITY_TYPES.contains(&kind) {
            Shape::Activity
        } else if INTRANSITIVE_ACTIVITY_TYPES.contains(&kind) {
            Shape::IntransitiveActivity
        } else if ACTOR_TYPES.contains(&kind) {
            Shape::Actor
        } else if ORDERED_COLLECTION_TYPES.contains(&kind) {
            Shape::OrderedCollection
        } else if COLLECTION_TYPES.contains(&kind) {
            Shape::Collection
        } else {
            Shape::Object
        }
    }

    pub fn has_actor(self) -> bool {
        matches!(self, Shape::Activity | Shape::IntransitiveActivity)
    }

    pub fn is_collection(self) -> bool {
        matches!(self, Shape::Collection | Shape::OrderedCollection)
    }
}

// ============================================================================
// Object
// ============================================================================

/// Any non-link node. Which fields are meaningful depends on [`Object::shape`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    pub id: Link,
    pub kind: String,
    pub name: NaturalLanguageValues,
    pub summary: NaturalLanguageValues,
    pub content: NaturalLanguageValues,
    pub preferred_username: NaturalLanguageValues,
    pub attributed_to: Option<Item>,
    pub in_reply_to: Option<Item>,
    pub context: Option<Item>,
    pub url: Option<Item>,
    pub to: Vec<Item>,
    pub cc: Vec<Item>,
    pub bto: Vec<Item>,
    pub bcc: Vec<Item>,
    pub audience: Vec<Item>,
    pub tag: Vec<Item>,
    pub actor: Option<Item>,
    pub object: Option<Item>,
    pub target: Option<Item>,
    /// Collection members; `None` for non-collections.
    pub items: Option<Vec<Item>>,
    pub total_items: Option<u64>,
    pub published: Option<String>,
}

impl Object {
    pub fn new(id: impl Into<Link>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn shape(&self) -> Shape {
        Shape::of_type(&self.kind)
    }

    /// Every addressing set, in to/cc/bto/bcc/audience order.
    pub fn recipients(&self) -> impl Iterator<Item = &Item> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bto)
            .chain(&self.bcc)
            .chain(&self.audience)
    }

    /// Replace the member list and keep `total_items` in step with it.
    pub fn set_items(&mut self, items: Vec<Item>) {
        self.total_items = Some(items.len() as u64);
        self.items = Some(items);
    }
}

// ============================================================================
// Item
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Link(Link),
    Object(Box<Object>),
    /// A bare list of items.
    Collection(Vec<Item>),
}

impl Item {
    pub fn link(raw: impl Into<Link>) -> Self {
        Item::Link(raw.into())
    }

    pub fn object(object: Object) -> Self {
        Item::Object(Box::new(object))
    }

    /// Identity of the item; bare lists have none.
    pub fn id(&self) -> Option<&Link> {
        match self {
            Item::Link(link) => Some(link),
            Item::Object(obj) => Some(&obj.id),
            Item::Collection(_) => None,
        }
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Item::Object(obj) if !obj.kind.is_empty() => Some(obj.kind.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Item::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Item::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Members of a bare list or of a collection object.
    pub fn members(&self) -> Option<&[Item]> {
        match self {
            Item::Collection(items) => Some(items),
            Item::Object(obj) if obj.shape().is_collection() => {
                Some(obj.items.as_deref().unwrap_or_default())
            }
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.members().is_some()
    }

    /// Flatten the links this item refers to: a link itself, an object's id,
    /// or every member of a list. Nil links are skipped.
    pub fn links(&self) -> Vec<&Link> {
        let mut out = Vec::new();
        collect_links(self, &mut out);
        out
    }
}

fn collect_links<'a>(item: &'a Item, out: &mut Vec<&'a Link>) {
    match item {
        Item::Link(link) if !link.is_nil() => out.push(link),
        Item::Object(obj) if !obj.id.is_nil() => out.push(&obj.id),
        Item::Collection(items) => {
            for it in items {
                collect_links(it, out);
            }
        }
        _ => {}
    }
}

impl From<Object> for Item {
    fn from(object: Object) -> Self {
        Item::object(object)
    }
}

impl From<Link> for Item {
    fn from(link: Link) -> Self {
        Item::Link(link)
    }
}
