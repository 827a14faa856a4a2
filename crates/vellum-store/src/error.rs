//! Error types for the store module.

use thiserror::Error;
use vellum_core::{ContentHash, CoreError};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A block the caller needed is missing.
    #[error("block not found: {0}")]
    NotFound(String),

    /// Stored bytes do not hash to the hash they were claimed under.
    #[error("integrity violation: expected {expected}, bytes hash to {actual}")]
    Integrity {
        expected: ContentHash,
        actual: ContentHash,
    },

    /// The hash's algorithm is not accepted by this store.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Unknown writer, or a signature that does not verify.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend could not be reached or did not answer in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Encoding or key error from core.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
