use thiserror::Error;

use crate::config::Field;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ExtractError {
    pub field: Field,
    pub reason: String,
}

impl ExtractError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("not an apfilter index file (bad magic)")]
    InvalidMagic,
    #[error("unsupported index format version {found} (expected {expected})")]
    IncompatibleVersion { found: u16, expected: u16 },
    #[error("payload holds a {found} index, expected {expected}")]
    WrongPayload { found: &'static str, expected: &'static str },
    #[error("index was built with seed {found:#x}, expected {expected:#x}")]
    SeedMismatch { found: u32, expected: u32 },
    #[error("index data truncated")]
    Truncated,
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("item has no identity to index")]
    MissingId,
    #[error("link `{0}` maps to the reserved zero reference")]
    ZeroRef(String),
    #[error("extraction failed for {}", describe(.0))]
    Extraction(Vec<ExtractError>),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

fn describe(errors: &[ExtractError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
