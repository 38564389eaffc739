//! Request path signing and verification.

use crate::error::{SignerError, SignerResult};
use crate::key::SharedSecret;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use sha3::Sha3_256;
use std::fmt;
use subtle::ConstantTimeEq;
use vignette_core::config::SigningAlgorithm;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;
type HmacSha3_256 = Hmac<Sha3_256>;

/// HMAC state keyed with the shared secret, cloned for every message.
#[derive(Clone)]
enum KeyedMac {
    Sha256(HmacSha256),
    Sha512(HmacSha512),
    Sha3_256(HmacSha3_256),
}

/// Signs and verifies request paths with a shared secret.
///
/// The signature is `base64(HMAC(secret, path))` using the standard alphabet
/// with padding. The path is used exactly as given.
#[derive(Clone)]
pub struct RequestSigner {
    algorithm: SigningAlgorithm,
    mac: KeyedMac,
}

impl RequestSigner {
    pub fn new(algorithm: SigningAlgorithm, secret: &SharedSecret) -> SignerResult<Self> {
        let invalid = |e: hmac::digest::InvalidLength| SignerError::InvalidKey(e.to_string());
        let mac = match algorithm {
            SigningAlgorithm::HmacSha256 => KeyedMac::Sha256(
                <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).map_err(invalid)?,
            ),
            SigningAlgorithm::HmacSha512 => KeyedMac::Sha512(
                <HmacSha512 as Mac>::new_from_slice(secret.as_bytes()).map_err(invalid)?,
            ),
            SigningAlgorithm::HmacSha3_256 => KeyedMac::Sha3_256(
                <HmacSha3_256 as Mac>::new_from_slice(secret.as_bytes()).map_err(invalid)?,
            ),
        };
        Ok(Self { algorithm, mac })
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Produce the signature header value for a request path.
    pub fn sign(&self, path: &str) -> String {
        let digest = match &self.mac {
            KeyedMac::Sha256(mac) => {
                let mut mac = mac.clone();
                mac.update(path.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            KeyedMac::Sha512(mac) => {
                let mut mac = mac.clone();
                mac.update(path.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            KeyedMac::Sha3_256(mac) => {
                let mut mac = mac.clone();
                mac.update(path.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
        };
        base64::engine::general_purpose::STANDARD.encode(digest)
    }

    /// Check a supplied signature against the path it claims to cover.
    ///
    /// The comparison runs over the full encoded value in constant time; a
    /// length difference is a mismatch like any other.
    pub fn verify(&self, signature: &str, path: &str) -> SignerResult<()> {
        let expected = self.sign(path);
        if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            Ok(())
        } else {
            Err(SignerError::Mismatch)
        }
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
