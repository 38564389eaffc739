//! Shared-secret request signing for the vignette thumbnail proxy.
//!
//! This crate provides:
//! - Secret loading from file, environment or inline config
//! - HMAC signing of request paths
//! - Constant-time signature verification

pub mod error;
pub mod key;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use key::{SharedSecret, load_secret};
pub use signer::RequestSigner;
