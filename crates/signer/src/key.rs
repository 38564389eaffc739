//! Shared secret handling.

use crate::error::{SignerError, SignerResult};
use std::fmt;
use vignette_core::config::SecretConfig;

/// HMAC secret shared between the proxy and whoever mints URLs.
#[derive(Clone)]
pub struct SharedSecret {
    bytes: Vec<u8>,
}

impl SharedSecret {
    /// Wrap raw secret bytes. Empty secrets are rejected.
    pub fn new(bytes: impl Into<Vec<u8>>) -> SignerResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(SignerError::InvalidKey("secret is empty".to_string()));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret([REDACTED; {}])", self.bytes.len())
    }
}

/// Load the secret from its configured source.
///
/// File and env secrets have surrounding whitespace trimmed so a trailing
/// newline from `echo` or a secrets mount does not change the key.
pub fn load_secret(config: &SecretConfig) -> SignerResult<SharedSecret> {
    match config {
        SecretConfig::File { path } => {
            let data = std::fs::read_to_string(path).map_err(|e| {
                SignerError::KeyLoading(format!(
                    "failed to read secret file {}: {e}",
                    path.display()
                ))
            })?;
            SharedSecret::new(data.trim())
        }
        SecretConfig::Env { var } => {
            let data = std::env::var(var).map_err(|_| {
                SignerError::KeyLoading(format!("secret env var not set: {var}"))
            })?;
            SharedSecret::new(data.trim())
        }
        SecretConfig::Value { key } => SharedSecret::new(key.as_str()),
    }
}
