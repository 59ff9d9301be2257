//! Identifier newtypes and the crate-wide error type.

use std::error::Error as StdError;
use std::fmt;

/// Logical entry index of one slot (node) inside a stage's exact-match table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SlotId(pub u32);

/// Caller-side identifier correlating a placed entry with table-manager state.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct EntryHandle(pub u32);

/// Errors surfaced by the placement engine.
#[derive(thiserror::Error, Debug)]
pub enum CuckooError {
    /// Caller bug: out-of-range index, malformed candidate set, bad option.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Table congested along the requested candidate set, or allocation failed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
    /// Invariant violation while building or executing a move list.
    #[error("internal: {0}")]
    Internal(&'static str),
    /// Node data requested for a slot that was never inserted.
    #[error("not found")]
    NotFound,
    /// Failure reported by the hardware-sync collaborator.
    #[error("slot sync: {0}")]
    Sync(#[source] Box<dyn StdError + Send + Sync>),
}

impl CuckooError {
    /// Whether the caller may retry the placement (e.g. with another hash-way set).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CuckooError::ResourceExhausted(_))
    }

    /// Short static label used by metrics sinks.
    pub fn kind(&self) -> &'static str {
        match self {
            CuckooError::InvalidArgument(_) => "invalid_argument",
            CuckooError::ResourceExhausted(_) => "resource_exhausted",
            CuckooError::Internal(_) => "internal",
            CuckooError::NotFound => "not_found",
            CuckooError::Sync(_) => "sync",
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CuckooError>;

impl SlotId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SlotId {
    fn from(value: u32) -> Self {
        SlotId(value)
    }
}

impl From<SlotId> for u32 {
    fn from(value: SlotId) -> Self {
        value.0
    }
}

impl From<u32> for EntryHandle {
    fn from(value: u32) -> Self {
        EntryHandle(value)
    }
}
