//! Error types for the pointers module.

use thiserror::Error;

/// Errors that can occur during pointer operations.
#[derive(Debug, Error)]
pub enum PointerError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] vellum_store::StoreError),

    /// Encoding or decoding of a core value failed.
    #[error("core error: {0}")]
    Core(#[from] vellum_core::CoreError),

    /// Request or response bytes do not follow the wire format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Unknown writer, or a payload whose signature does not verify.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The remote service answered with an error status.
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// No answer within the request timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),
}

impl PointerError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::TransportError(_) => true,
            Self::Remote { status, .. } => *status >= 500,
            Self::Store(vellum_store::StoreError::Unavailable(_)) => true,
            _ => false,
        }
    }
}

/// Result type for pointer operations.
pub type Result<T> = std::result::Result<T, PointerError>;
