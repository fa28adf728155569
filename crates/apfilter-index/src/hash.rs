//! Item-hash-references: 32-bit keys stored in the bitmaps.
//!
//! The default reference is a seeded FNV-1a over the canonical link. It is
//! deterministic and non-cryptographic; callers that need a different mapping
//! (tests forcing collisions, for instance) pass their own [`RefHasher`].

use apfilter_vocab::{canonicalize, is_nil_str};

/// The reserved "no item" reference. Never stored in any bitmap.
pub const NIL_REF: u32 = 0;

/// `(canonical link, seed) -> reference`.
pub type RefHasher = fn(&str, u32) -> u32;

pub fn fnv1a32_seeded(bytes: &[u8], seed: u32) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let mut hash = FNV_OFFSET_BASIS;
    for b in seed.to_le_bytes().iter().chain(bytes) {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Default [`RefHasher`].
pub fn default_hasher(canonical: &str, seed: u32) -> u32 {
    fnv1a32_seeded(canonical.as_bytes(), seed)
}

/// Reference for `link`, or [`NIL_REF`] for nil links.
pub fn item_ref(hasher: RefHasher, link: &str, seed: u32) -> u32 {
    if is_nil_str(link) {
        return NIL_REF;
    }
    hasher(&canonicalize(link), seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_links_map_to_zero() {
        assert_eq!(item_ref(default_hasher, "", 1), NIL_REF);
        assert_eq!(item_ref(default_hasher, "-", 1), NIL_REF);
    }

    #[test]
    fn equivalent_links_share_a_reference() {
        let a = item_ref(default_hasher, "HTTPS://Example.com/a/", 9);
        let b = item_ref(default_hasher, "https://example.com/a", 9);
        assert_eq!(a, b);
        assert_ne!(a, NIL_REF);
    }

    #[test]
    fn seed_changes_the_reference() {
        let a = item_ref(default_hasher, "https://example.com/a", 1);
        let b = item_ref(default_hasher, "https://example.com/a", 2);
        assert_ne!(a, b);
    }
}
