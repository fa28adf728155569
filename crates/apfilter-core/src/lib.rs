//! apfilter-core: predicates over ActivityStreams items and their renderers.
//!
//! One check tree, four consumers:
//!
//! ```text
//!                         ┌──────────────► eval     (in-memory items)
//!  query string ──► Checks ──────────────► sql      (WHERE fragments + values)
//!        ▲                ├──────────────► pattern  (raw JSON records)
//!        └──── query ◄────┘                cursor   (after / before / maxItems)
//! ```
//!
//! Index atoms are produced by `apfilter-index`, which depends on this crate.

pub mod check;
pub mod cursor;
pub mod eval;
pub mod pattern;
pub mod query;
pub mod sql;

pub use check::{
    like_haystack, like_needle, Check, Checks, LinkField, LinkMatch, Page, Projection, TextField,
    TextMatch,
};
pub use cursor::{Cursor, CursorStep};
pub use eval::{filter_item, filter_items};
pub use pattern::{build_pattern, matches_raw, Pattern, PatternError};
pub use query::{encode_query, parse_query};
pub use sql::{sql_limit, sql_where, SqlWhere};
