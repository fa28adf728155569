//! Canonical links.
//!
//! A [`Link`] is the identity of an item in the federated graph. Links are
//! compared in canonical form: scheme and host lowercased, a trailing `/`
//! dropped, an empty fragment removed. Strings that do not parse as URLs are
//! compared by their trimmed text.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Explicit "no value" marker. The empty string is the other one.
pub const NIL_MARKER: &str = "-";

/// The ActivityStreams public collection.
pub const PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(String);

impl Link {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The explicit nil marker (`-`).
    pub fn nil() -> Self {
        Self(NIL_MARKER.to_string())
    }

    pub fn public() -> Self {
        Self(PUBLIC.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True for both sentinels meaning "no value".
    pub fn is_nil(&self) -> bool {
        is_nil_str(&self.0)
    }

    pub fn is_public(&self) -> bool {
        self.same_as(PUBLIC)
    }

    pub fn canonical(&self) -> String {
        canonicalize(&self.0)
    }

    /// Canonical equality against a raw link string.
    pub fn same_as(&self, other: &str) -> bool {
        canonicalize(&self.0) == canonicalize(other)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Link {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Link {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Link {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn is_nil_str(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == NIL_MARKER
}

/// Canonical form of a raw link string. Never fails: unparseable input is
/// returned trimmed.
pub fn canonicalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if is_nil_str(trimmed) {
        return trimmed.to_string();
    }
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    if parsed.fragment() == Some("") {
        parsed.set_fragment(None);
    }
    let has_suffix = parsed.query().is_some() || parsed.fragment().is_some();
    let mut out: String = parsed.into();
    if !has_suffix {
        while out.ends_with('/') && !out.ends_with("://") {
            out.pop();
        }
    }
    out
}
