//! Field index: `field -> token -> {item refs}`, plus `ref -> link`.
//!
//! Design:
//! - One inverted index per registered field, keyed by normalized token.
//! - Item identity is a 32-bit reference (see [`crate::hash`]); the global
//!   reference map turns surviving references back into links.
//! - A single `RwLock` guards both maps. `add` holds the write lock for the
//!   whole item; lookups share the read lock.

use ahash::AHashMap;
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use apfilter_vocab::{Item, Link};

use crate::config::{Field, IndexConfig};
use crate::error::IndexError;
use crate::filter::{BasicFilter, Operator};
use crate::hash::{default_hasher, item_ref, RefHasher, NIL_REF};
use crate::persist::{self, PayloadKind};
use crate::tokens;

type TokenMap = AHashMap<String, RoaringBitmap>;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct IndexState {
    fields: AHashMap<Field, TokenMap>,
    refs: AHashMap<u32, String>,
}

impl IndexState {
    fn all_refs(&self) -> RoaringBitmap {
        self.refs.keys().copied().collect()
    }

    fn union_exact(map: &TokenMap, tokens: &[String]) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        for token in tokens {
            if let Some(bm) = map.get(token) {
                out |= bm;
            }
        }
        out
    }

    fn union_containing(field: Field, map: &TokenMap, needles: &[String]) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        if needles.is_empty() {
            return out;
        }
        let needles: Vec<String> = needles.iter().map(|n| n.to_lowercase()).collect();
        for (token, bm) in map {
            let haystack = tokens::searchable_text(field, token);
            if needles.iter().any(|n| haystack.contains(n.as_str())) {
                out |= bm;
            }
        }
        out
    }
}

pub struct Index {
    config: IndexConfig,
    hasher: RefHasher,
    inner: RwLock<IndexState>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read();
        f.debug_struct("Index")
            .field("config", &self.config)
            .field("items", &state.refs.len())
            .finish()
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl Index {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_hasher(config, default_hasher)
    }

    /// Use a custom reference function instead of seeded FNV-1a.
    pub fn with_hasher(config: IndexConfig, hasher: RefHasher) -> Self {
        Self {
            config,
            hasher,
            inner: RwLock::new(IndexState::default()),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of distinct item references.
    pub fn len(&self) -> usize {
        self.inner.read().refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reference(&self, link: &str) -> u32 {
        item_ref(self.hasher, link, self.config.seed)
    }

    pub fn contains(&self, link: &str) -> bool {
        let r = self.reference(link);
        r != NIL_REF && self.inner.read().refs.contains_key(&r)
    }

    /// Ingest `item` into every registered field index.
    ///
    /// Fields that extract cleanly stay indexed even when others fail; the
    /// failures come back together as [`IndexError::Extraction`].
    pub fn add(&self, item: &Item) -> Result<(), IndexError> {
        let id = item
            .id()
            .filter(|l| !l.is_nil())
            .ok_or(IndexError::MissingId)?;
        let reference = self.reference(id.as_str());
        if reference == NIL_REF {
            return Err(IndexError::ZeroRef(id.to_string()));
        }

        let mut state = self.inner.write();
        let mut failures = Vec::new();
        for field in &self.config.fields {
            match tokens::extract(*field, item, &self.config) {
                Ok(tokens) => {
                    let map = state.fields.entry(*field).or_default();
                    for token in tokens {
                        map.entry(token).or_default().insert(reference);
                    }
                }
                Err(err) => failures.push(err),
            }
        }
        if let Some(previous) = state.refs.insert(reference, id.canonical()) {
            if previous != id.canonical() {
                warn!(%previous, link = %id, reference, "reference collision, keeping newest link");
            }
        }
        drop(state);

        if failures.is_empty() {
            trace!(link = %id, reference, "indexed item");
            Ok(())
        } else {
            warn!(link = %id, failed = failures.len(), "partial extraction");
            Err(IndexError::Extraction(failures))
        }
    }

    /// Links of the items satisfying every filter. No filters selects every
    /// indexed item.
    pub fn find(&self, filters: &[BasicFilter]) -> Result<Vec<Link>, IndexError> {
        let state = self.inner.read();
        let bitmap = self.resolve(&state, None, filters);
        Ok(self.dereference(&state, &bitmap))
    }

    /// Like [`Index::find`], restricted to the references in `scope`.
    pub fn find_in(
        &self,
        scope: &RoaringBitmap,
        filters: &[BasicFilter],
    ) -> Result<Vec<Link>, IndexError> {
        let state = self.inner.read();
        let bitmap = self.resolve(&state, Some(scope), filters);
        Ok(self.dereference(&state, &bitmap))
    }

    /// The references matching `filters`, without dereferencing.
    pub fn search(&self, filters: &[BasicFilter]) -> RoaringBitmap {
        let state = self.inner.read();
        self.resolve(&state, None, filters)
    }

    fn resolve(
        &self,
        state: &IndexState,
        scope: Option<&RoaringBitmap>,
        filters: &[BasicFilter],
    ) -> RoaringBitmap {
        let mut acc = match scope {
            Some(scope) => scope & &state.all_refs(),
            None => state.all_refs(),
        };
        for filter in filters {
            if acc.is_empty() {
                break;
            }
            let matched = self.resolve_atom(state, filter);
            trace!(field = %filter.field, op = ?filter.op, matched = matched.len(), "resolved atom");
            acc &= matched;
        }
        acc
    }

    fn resolve_atom(&self, state: &IndexState, filter: &BasicFilter) -> RoaringBitmap {
        if !self.config.has_field(filter.field) {
            debug!(field = %filter.field, "field not indexed");
            return RoaringBitmap::new();
        }
        let empty = TokenMap::default();
        let map = state.fields.get(&filter.field).unwrap_or(&empty);
        let values: Vec<String> = filter
            .values
            .iter()
            .flat_map(|v| tokens::normalize_lookup(filter.field, filter.op, v, &self.config))
            .collect();
        match filter.op {
            Operator::Equals => IndexState::union_exact(map, &values),
            Operator::Like => IndexState::union_containing(filter.field, map, &values),
            Operator::Not => state.all_refs() - IndexState::union_exact(map, &values),
        }
    }

    fn dereference(&self, state: &IndexState, bitmap: &RoaringBitmap) -> Vec<Link> {
        bitmap
            .iter()
            .filter_map(|r| match state.refs.get(&r) {
                Some(link) => Some(Link::new(link.clone())),
                None => {
                    warn!(reference = r, "reference without a live link, dropping");
                    None
                }
            })
            .collect()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn snapshot(&self) -> Result<Vec<u8>, IndexError> {
        let state = self.inner.read();
        Ok(persist::encode(
            PayloadKind::FieldIndex,
            &(self.config.seed, &*state),
        )?)
    }

    pub fn restore(config: IndexConfig, bytes: &[u8]) -> Result<Self, IndexError> {
        Self::restore_with_hasher(config, default_hasher, bytes)
    }

    pub fn restore_with_hasher(
        config: IndexConfig,
        hasher: RefHasher,
        bytes: &[u8],
    ) -> Result<Self, IndexError> {
        let state: IndexState =
            persist::decode_seeded(PayloadKind::FieldIndex, config.seed, bytes)?;
        debug!(items = state.refs.len(), fields = state.fields.len(), "restored index");
        Ok(Self {
            config,
            hasher,
            inner: RwLock::new(state),
        })
    }

    pub fn save(&self, path: &std::path::Path) -> Result<(), IndexError> {
        let bytes = self.snapshot()?;
        persist::write_file(path, &bytes)?;
        Ok(())
    }

    pub fn load(config: IndexConfig, path: &std::path::Path) -> Result<Self, IndexError> {
        let bytes = persist::read_file(path)?;
        Self::restore(config, &bytes)
    }
}
