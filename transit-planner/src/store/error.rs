//! Store error types.

use crate::domain::DomainError;

/// Which kind of record a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Stop,
    Trip,
    Connection,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RecordKind::Stop => "stop",
            RecordKind::Trip => "trip",
            RecordKind::Connection => "connection",
        })
    }
}

/// Errors that can occur when writing, reading or querying a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Lookup by global id found nothing
    #[error("{kind} not found: {global_id}")]
    NotFound { kind: RecordKind, global_id: String },

    /// A second writer was requested while one is open
    #[error("a writer is already active on this database")]
    WriterActive,

    /// Window layout must be non-zero
    #[error("invalid window layout: size {size}s, count {count}")]
    InvalidWindows { size: u32, count: u32 },

    /// A record references an id the store does not hold
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// Persisted data starts with an unknown version tag
    #[error("unsupported store version {0}")]
    UnsupportedVersion(u8),

    /// Persisted data is structurally invalid
    #[error("corrupt store data: {0}")]
    Corrupt(String),

    /// Record failed validation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Underlying reader/writer failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
