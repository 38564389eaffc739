//! Signer error types.

use thiserror::Error;

/// Signing operation errors.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The supplied signature does not match. Deliberately carries no detail.
    #[error("signature mismatch")]
    Mismatch,

    #[error("key loading error: {0}")]
    KeyLoading(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Result type for signing operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
