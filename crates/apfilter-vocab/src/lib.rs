//! apfilter vocabulary: the slice of the ActivityStreams model the predicate
//! engine and the bitmap index read.
//!
//! - [`Link`]: canonical identifiers with the nil/empty sentinels
//! - [`NaturalLanguageValues`]: language-keyed strings
//! - [`Item`]: link, object or bare list, with a total JSON codec

pub mod item;
pub mod json;
pub mod link;
pub mod natural_language;

pub use item::{Item, Object, Shape};
pub use link::{canonicalize, is_nil_str, Link, NIL_MARKER, PUBLIC};
pub use natural_language::{NaturalLanguageValues, UNDETERMINED};
