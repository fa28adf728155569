//! Persisted index envelope.
//!
//! ```text
//! [0..4]  magic  "APFX"
//! [4..6]  format version (u16 LE)
//! [6]     payload kind (1 = field index, 2 = collection index)
//! [7..]   bincode payload: (reference seed, index maps)
//! ```
//!
//! References are only meaningful under the seed they were hashed with, so
//! the seed travels with the payload and a mismatch refuses to load.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::PersistError;

pub const MAGIC: [u8; 4] = *b"APFX";
pub const FORMAT_VERSION: u16 = 2;

const HEADER_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    FieldIndex = 1,
    CollectionIndex = 2,
}

impl PayloadKind {
    fn name(self) -> &'static str {
        match self {
            PayloadKind::FieldIndex => "field",
            PayloadKind::CollectionIndex => "collection",
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(PayloadKind::FieldIndex),
            2 => Some(PayloadKind::CollectionIndex),
            _ => None,
        }
    }
}

pub(crate) fn encode<T: Serialize>(kind: PayloadKind, payload: &T) -> Result<Vec<u8>, PersistError> {
    let body = bincode::serialize(payload)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(kind as u8);
    out.extend_from_slice(&body);
    debug!(kind = kind.name(), bytes = out.len(), "encoded index");
    Ok(out)
}

pub(crate) fn decode<T: DeserializeOwned>(kind: PayloadKind, bytes: &[u8]) -> Result<T, PersistError> {
    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(PersistError::InvalidMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(PersistError::Truncated);
    }
    let found = u16::from_le_bytes([bytes[4], bytes[5]]);
    if found != FORMAT_VERSION {
        return Err(PersistError::IncompatibleVersion {
            found,
            expected: FORMAT_VERSION,
        });
    }
    match PayloadKind::from_byte(bytes[6]) {
        Some(k) if k == kind => {}
        other => {
            return Err(PersistError::WrongPayload {
                found: other.map(PayloadKind::name).unwrap_or("unknown"),
                expected: kind.name(),
            })
        }
    }
    Ok(bincode::deserialize(&bytes[HEADER_LEN..])?)
}

/// Decode a `(seed, payload)` pair and require the seed to be `seed`.
pub(crate) fn decode_seeded<T: DeserializeOwned>(
    kind: PayloadKind,
    seed: u32,
    bytes: &[u8],
) -> Result<T, PersistError> {
    let (found, payload): (u32, T) = decode(kind, bytes)?;
    if found != seed {
        return Err(PersistError::SeedMismatch {
            found,
            expected: seed,
        });
    }
    Ok(payload)
}

/// Write `bytes` to `path` through a sibling temp file.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("apfx.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_file(path: &Path) -> Result<Vec<u8>, PersistError> {
    Ok(fs::read(path)?)
}
