//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid size requested: {0}")]
    InvalidSize(String),

    #[error("invalid source reference: {0}")]
    InvalidSource(String),

    #[error("unknown image format")]
    UnknownFormat,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
