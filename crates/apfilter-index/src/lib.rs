//! apfilter-index: roaring-bitmap indexes over ActivityStreams items.
//!
//! - [`Index`]: one inverted index per registered [`Field`], resolving
//!   conjunctive [`BasicFilter`] queries to item links.
//! - [`CollectionIndex`]: collection link to member references, usable as a
//!   scope for [`Index::find_in`].
//! - [`filters_from_checks`]: the index-expressible part of a check tree;
//!   [`confirm_candidates`] re-checks what the index returns.
//!
//! Both indexes persist through the same versioned envelope (see [`persist`]).

pub mod collection;
pub mod config;
pub mod error;
pub mod filter;
pub mod hash;
pub mod index;
pub mod persist;
pub mod tokens;

pub use collection::CollectionIndex;
pub use config::{Field, IndexConfig, UnknownField, DEFAULT_SEED};
pub use error::{ExtractError, IndexError, PersistError};
pub use filter::{confirm_candidates, filters_from_checks, BasicFilter, Operator};
pub use hash::{default_hasher, RefHasher, NIL_REF};
pub use index::Index;
