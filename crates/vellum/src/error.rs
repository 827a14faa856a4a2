//! Error types for Vellum.

use thiserror::Error;
use vellum_core::{display_optional, ContentHash, CoreError, OptionalHash};
use vellum_pointers::PointerError;
use vellum_store::StoreError;

/// Errors that can occur during tree and pointer operations.
///
/// CAS failures are ordinary, expected outcomes under concurrency; see
/// [`Error::is_retryable`]. Integrity and format failures abort the
/// operation and leave the in-memory tree untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced block is missing from the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// The value stored under a key is not the one the caller expected.
    #[error(
        "CAS mismatch on key {}: expected {}, found {}",
        hex::encode(key),
        display_optional(expected),
        display_optional(actual)
    )]
    CasMismatch {
        key: Vec<u8>,
        expected: OptionalHash,
        actual: OptionalHash,
    },

    /// The pointer service rejected the root update: someone else moved it.
    #[error("pointer conflict: published root is no longer {}", display_optional(expected))]
    PointerConflict { expected: OptionalHash },

    /// Bytes do not hash to the hash they were fetched or stored under.
    #[error("integrity violation: expected {expected}, bytes hash to {actual}")]
    IntegrityViolation {
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Stored bytes are not a valid node.
    #[error("malformed node: {0}")]
    MalformedNode(String),

    /// Hash or signature scheme not implemented or not accepted.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Network or timeout failure from a collaborator.
    #[error("transient failure: {0}")]
    TransientFailure(String),

    /// Unknown writer or bad signature.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Other storage error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// Other pointer protocol error.
    #[error("pointer error: {0}")]
    Pointer(PointerError),

    /// Other encoding error.
    #[error("core error: {0}")]
    Core(CoreError),
}

impl Error {
    /// Whether the caller may re-read and try again.
    ///
    /// True for CAS and pointer conflicts and transient failures. The
    /// library never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CasMismatch { .. } | Self::PointerConflict { .. } | Self::TransientFailure(_)
        )
    }
}

impl From<CoreError> for Error {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::MalformedNode(msg) => Self::MalformedNode(msg),
            CoreError::UnsupportedAlgorithm(msg) => Self::UnsupportedAlgorithm(msg),
            other => Self::Core(other),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Integrity { expected, actual } => {
                Self::IntegrityViolation { expected, actual }
            }
            StoreError::UnsupportedAlgorithm(msg) => Self::UnsupportedAlgorithm(msg),
            StoreError::Unauthorized(msg) => Self::Unauthorized(msg),
            StoreError::Unavailable(msg) => Self::TransientFailure(msg),
            StoreError::Core(core) => core.into(),
            other => Self::Store(other),
        }
    }
}

impl From<PointerError> for Error {
    fn from(e: PointerError) -> Self {
        match e {
            PointerError::Store(store) => store.into(),
            PointerError::Core(core) => core.into(),
            PointerError::Unauthorized(msg) => Self::Unauthorized(msg),
            PointerError::Timeout(msg) | PointerError::TransportError(msg) => {
                Self::TransientFailure(msg)
            }
            PointerError::Remote { status, message } if status >= 500 => {
                Self::TransientFailure(format!("remote status {}: {}", status, message))
            }
            other => Self::Pointer(other),
        }
    }
}

/// Result type for Vellum operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let h = ContentHash::sha256(b"x");
        assert!(Error::CasMismatch {
            key: b"k".to_vec(),
            expected: None,
            actual: Some(h)
        }
        .is_retryable());
        assert!(Error::PointerConflict { expected: Some(h) }.is_retryable());
        assert!(Error::from(PointerError::Timeout("t".into())).is_retryable());
        assert!(!Error::IntegrityViolation {
            expected: h,
            actual: h
        }
        .is_retryable());
        assert!(!Error::MalformedNode("bad".into()).is_retryable());
    }

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let h = ContentHash::sha256(b"x");
        let e: Error = StoreError::Integrity {
            expected: h,
            actual: h,
        }
        .into();
        assert!(matches!(e, Error::IntegrityViolation { .. }));

        let e: Error = StoreError::Core(CoreError::MalformedNode("x".into())).into();
        assert!(matches!(e, Error::MalformedNode(_)));

        let e: Error = PointerError::Store(StoreError::UnsupportedAlgorithm("blake3".into())).into();
        assert!(matches!(e, Error::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_cas_mismatch_message() {
        let e = Error::CasMismatch {
            key: b"ab".to_vec(),
            expected: None,
            actual: None,
        };
        assert_eq!(e.to_string(), "CAS mismatch on key 6162: expected absent, found absent");
    }
}
