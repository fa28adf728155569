//! Collection membership: `collection link -> {member refs}`.

use ahash::AHashMap;
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use tracing::{debug, warn};

use apfilter_vocab::{canonicalize, is_nil_str, Item};

use crate::config::IndexConfig;
use crate::error::{IndexError, PersistError};
use crate::hash::{default_hasher, item_ref, RefHasher, NIL_REF};
use crate::persist::{self, PayloadKind};

#[derive(Debug)]
pub struct CollectionIndex {
    seed: u32,
    hasher: RefHasher,
    inner: RwLock<AHashMap<String, RoaringBitmap>>,
}

impl Default for CollectionIndex {
    fn default() -> Self {
        Self::new(&IndexConfig::default())
    }
}

impl CollectionIndex {
    /// Shares the reference seed with the field index built from `config`,
    /// so member bitmaps can scope [`crate::Index::find_in`].
    pub fn new(config: &IndexConfig) -> Self {
        Self::with_hasher(config, default_hasher)
    }

    pub fn with_hasher(config: &IndexConfig, hasher: RefHasher) -> Self {
        Self {
            seed: config.seed,
            hasher,
            inner: RwLock::new(AHashMap::new()),
        }
    }

    fn reference(&self, link: &str) -> u32 {
        item_ref(self.hasher, link, self.seed)
    }

    /// Record `member` in `collection`. Returns false when either link is
    /// nil or the member was already present.
    pub fn add_member(&self, collection: &str, member: &str) -> bool {
        let r = self.reference(member);
        if r == NIL_REF || is_nil_str(collection) {
            return false;
        }
        self.inner
            .write()
            .entry(canonicalize(collection))
            .or_default()
            .insert(r)
    }

    /// Record every member of a collection object under its id. Returns the
    /// number of members added.
    pub fn add_collection(&self, item: &Item) -> Result<usize, IndexError> {
        let collection = item
            .id()
            .filter(|l| !l.is_nil())
            .ok_or(IndexError::MissingId)?;
        let Some(members) = item.members() else {
            debug!(link = %collection, "not a collection, nothing to record");
            return Ok(0);
        };
        let token = collection.canonical();
        let mut inner = self.inner.write();
        let bitmap = inner.entry(token).or_default();
        let mut added = 0;
        for link in members.iter().flat_map(Item::links) {
            match self.reference(link.as_str()) {
                NIL_REF => warn!(member = %link, "member maps to the zero reference"),
                r => added += usize::from(bitmap.insert(r)),
            }
        }
        Ok(added)
    }

    pub fn remove_member(&self, collection: &str, member: &str) -> bool {
        let r = self.reference(member);
        let mut inner = self.inner.write();
        let key = canonicalize(collection);
        let Some(bitmap) = inner.get_mut(&key) else {
            return false;
        };
        let removed = bitmap.remove(r);
        if bitmap.is_empty() {
            inner.remove(&key);
        }
        removed
    }

    /// Member references of `collection`; empty when unknown.
    pub fn members(&self, collection: &str) -> RoaringBitmap {
        self.inner
            .read()
            .get(&canonicalize(collection))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, collection: &str, member: &str) -> bool {
        let r = self.reference(member);
        r != NIL_REF
            && self
                .inner
                .read()
                .get(&canonicalize(collection))
                .is_some_and(|bm| bm.contains(r))
    }

    /// Collections that list `member`, sorted.
    pub fn collections_of(&self, member: &str) -> Vec<String> {
        let r = self.reference(member);
        let mut out: Vec<String> = self
            .inner
            .read()
            .iter()
            .filter(|(_, bm)| bm.contains(r))
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, PersistError> {
        persist::encode(PayloadKind::CollectionIndex, &(self.seed, &*self.inner.read()))
    }

    pub fn decode(config: &IndexConfig, bytes: &[u8]) -> Result<Self, PersistError> {
        Self::decode_with_hasher(config, default_hasher, bytes)
    }

    /// Restore membership encoded by an index built with `hasher`. The seed
    /// recorded in `bytes` must equal `config.seed`.
    pub fn decode_with_hasher(
        config: &IndexConfig,
        hasher: RefHasher,
        bytes: &[u8],
    ) -> Result<Self, PersistError> {
        let map: AHashMap<String, RoaringBitmap> =
            persist::decode_seeded(PayloadKind::CollectionIndex, config.seed, bytes)?;
        debug!(collections = map.len(), "restored collection index");
        Ok(Self {
            seed: config.seed,
            hasher,
            inner: RwLock::new(map),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apfilter_vocab::Object;

    fn outbox() -> Item {
        let mut obj = Object::new("https://ex.com/bob/outbox", "OrderedCollection");
        obj.set_items(vec![
            Item::link("https://ex.com/a/1"),
            Item::object(Object::new("https://ex.com/a/2", "Create")),
            Item::link("-"),
        ]);
        Item::object(obj)
    }

    #[test]
    fn add_collection_records_members() {
        let index = CollectionIndex::default();
        assert_eq!(index.add_collection(&outbox()).unwrap(), 2);
        assert!(index.contains("https://ex.com/bob/outbox/", "https://ex.com/a/2"));
        assert_eq!(index.members("https://ex.com/bob/outbox").len(), 2);
        assert_eq!(
            index.collections_of("https://ex.com/a/1"),
            vec!["https://ex.com/bob/outbox"]
        );
    }

    #[test]
    fn membership_edits() {
        let index = CollectionIndex::default();
        assert!(index.add_member("https://ex.com/c", "https://ex.com/x"));
        assert!(!index.add_member("https://ex.com/c", "https://ex.com/x"));
        assert!(!index.add_member("https://ex.com/c", "-"));
        assert!(index.remove_member("https://ex.com/c", "https://ex.com/x"));
        assert!(!index.contains("https://ex.com/c", "https://ex.com/x"));
        assert!(index.is_empty());
    }

    #[test]
    fn encode_decode_keeps_membership() {
        let index = CollectionIndex::default();
        index.add_collection(&outbox()).unwrap();
        let bytes = index.encode().unwrap();
        let back = CollectionIndex::decode(&IndexConfig::default(), &bytes).unwrap();
        assert!(back.contains("https://ex.com/bob/outbox", "https://ex.com/a/1"));
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn decode_rejects_another_seed() {
        let index = CollectionIndex::new(&IndexConfig::default().with_seed(3));
        index.add_collection(&outbox()).unwrap();
        let bytes = index.encode().unwrap();
        assert!(matches!(
            CollectionIndex::decode(&IndexConfig::default().with_seed(4), &bytes),
            Err(PersistError::SeedMismatch { found: 3, expected: 4 })
        ));
    }

    #[test]
    fn decode_keeps_a_custom_hasher() {
        fn by_len(link: &str, seed: u32) -> u32 {
            seed.wrapping_add(link.len() as u32)
        }
        let config = IndexConfig::default();
        let index = CollectionIndex::with_hasher(&config, by_len);
        index.add_member("https://ex.com/c", "https://ex.com/x");
        let bytes = index.encode().unwrap();
        let back = CollectionIndex::decode_with_hasher(&config, by_len, &bytes).unwrap();
        assert!(back.contains("https://ex.com/c", "https://ex.com/x"));
        assert!(!CollectionIndex::decode(&config, &bytes)
            .unwrap()
            .contains("https://ex.com/c", "https://ex.com/x"));
    }
}
