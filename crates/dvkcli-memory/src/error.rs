//! Error types for memory operations.

use rusqlite::ErrorCode;
use rusqlite::ffi::{SQLITE_CONSTRAINT_FOREIGNKEY, SQLITE_CONSTRAINT_PRIMARYKEY};

/// Errors returned by the store, the similarity engine, and the façade.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// A conversation or message id is already taken.
    #[error("duplicate identity: {0}")]
    DuplicateIdentity(String),
    /// A message references a conversation that does not exist.
    #[error("conversation does not exist: {0}")]
    ForeignKeyViolation(String),
    /// The embedding provider failed or returned nothing.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
    /// A stored role string is outside the closed role set.
    #[error("invalid message role: {0}")]
    InvalidRole(String),
    /// SQLite error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Constraint class reported by SQLite for a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Constraint {
    PrimaryKey,
    ForeignKey,
}

/// Classify a rusqlite error by its extended constraint code.
pub(crate) fn constraint_of(err: &rusqlite::Error) -> Option<Constraint> {
    let rusqlite::Error::SqliteFailure(failure, _) = err else {
        return None;
    };
    if failure.code != ErrorCode::ConstraintViolation {
        return None;
    }
    match failure.extended_code {
        SQLITE_CONSTRAINT_PRIMARYKEY => Some(Constraint::PrimaryKey),
        SQLITE_CONSTRAINT_FOREIGNKEY => Some(Constraint::ForeignKey),
        _ => None,
    }
}
