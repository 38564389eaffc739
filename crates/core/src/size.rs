//! Size tokens and their pixel dimensions.
//!
//! Clients never ask for raw pixel sizes. They name a token (`thumb`,
//! `medium`, ...) and the configured policy decides what that means.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Target dimensions in pixels. Both are strictly positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions, rejecting zero on either axis.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSize(format!(
                "dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Parse a `<width>x<height>` value.
    ///
    /// The value must split into exactly two parts on `x` and each part must be
    /// a plain decimal number. Nothing is trimmed, rounded or clamped.
    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split('x').collect();
        let [width, height] = parts.as_slice() else {
            return Err(Error::InvalidSize(format!(
                "expected <width>x<height>, got {value:?}"
            )));
        };
        Self::new(parse_dimension(width, value)?, parse_dimension(height, value)?)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn parse_dimension(part: &str, value: &str) -> Result<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidSize(format!(
            "dimension {part:?} in {value:?} is not a positive integer"
        )));
    }
    part.parse::<u32>()
        .map_err(|e| Error::InvalidSize(format!("dimension {part:?} in {value:?}: {e}")))
}

/// The configured allow-list of size tokens.
///
/// Values are kept as configured and parsed on lookup, so a malformed entry
/// fails the requests that use it instead of silently falling back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizePolicy {
    sizes: BTreeMap<String, String>,
}

impl SizePolicy {
    /// Build a policy from token -> `WxH` pairs.
    pub fn from_map<K, V>(sizes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            sizes: sizes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Resolve a token to concrete dimensions.
    ///
    /// Unknown tokens fail closed; there is no default size.
    pub fn resolve(&self, token: &str) -> Result<Dimensions> {
        let value = self
            .sizes
            .get(token)
            .ok_or_else(|| Error::InvalidSize(format!("unknown size token {token:?}")))?;
        Dimensions::parse(value)
    }

    /// Whether the token is configured at all.
    pub fn contains(&self, token: &str) -> bool {
        self.sizes.contains_key(token)
    }

    /// Configured tokens in sorted order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.sizes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Validate the policy at startup.
    ///
    /// Tokens that would corrupt the cache key layout are a hard error.
    /// Values that do not parse are reported as warnings: the requests that
    /// use them will be rejected with an invalid size error.
    pub fn validate(&self) -> std::result::Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.sizes.is_empty() {
            warnings.push("sizes is empty; every resize request will be rejected".to_string());
        }

        for (token, value) in &self.sizes {
            if token.is_empty() || token.contains('/') || token == "." || token == ".." {
                return Err(format!(
                    "size token {token:?} is not a valid path segment"
                ));
            }
            if let Err(e) = Dimensions::parse(value) {
                warnings.push(format!("sizes.{token}: {e}"));
            }
        }

        Ok(warnings)
    }
}
