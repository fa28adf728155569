//! Index configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default seed for item-hash-references.
pub const DEFAULT_SEED: u32 = 0x6170_6678;

/// Logical fields a field index can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Type,
    /// `name` and `preferredUsername`, one token per value.
    Name,
    Summary,
    Content,
    Actor,
    Object,
    AttributedTo,
    InReplyTo,
    /// Union of to/cc/bto/bcc/audience.
    Recipients,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Type,
        Field::Name,
        Field::Summary,
        Field::Content,
        Field::Actor,
        Field::Object,
        Field::AttributedTo,
        Field::InReplyTo,
        Field::Recipients,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Type => "type",
            Field::Name => "name",
            Field::Summary => "summary",
            Field::Content => "content",
            Field::Actor => "actor",
            Field::Object => "object",
            Field::AttributedTo => "attributedTo",
            Field::InReplyTo => "inReplyTo",
            Field::Recipients => "recipients",
        }
    }

    /// Fields whose tokens are canonical links.
    pub fn is_link_valued(self) -> bool {
        matches!(
            self,
            Field::Actor | Field::Object | Field::AttributedTo | Field::InReplyTo | Field::Recipients
        )
    }

    /// Fields whose tokens are segmented words.
    pub fn is_word_valued(self) -> bool {
        matches!(self, Field::Summary | Field::Content)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown index field `{0}`")]
pub struct UnknownField(pub String);

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Seed for the item-hash-reference function.
    pub seed: u32,
    /// Registered field indexes. Filters on other fields resolve to nothing.
    pub fields: Vec<Field>,
    /// Shorter words are not indexed from summary/content.
    pub min_word_len: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            fields: Field::ALL.to_vec(),
            min_word_len: 2,
        }
    }
}

impl IndexConfig {
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }
}
