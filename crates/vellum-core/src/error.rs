//! Error types for Vellum core.

use thiserror::Error;

/// Errors raised by the pure primitives: hashing, signing, and encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed content hash: {0}")]
    MalformedHash(String),

    #[error("malformed node: {0}")]
    MalformedNode(String),

    #[error("malformed CAS pair: {0}")]
    MalformedCasPair(String),

    #[error("CAS pair original and updated are both {0}")]
    NoOpCas(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
