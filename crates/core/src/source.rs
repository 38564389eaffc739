//! Source references: where the full-size image lives.

use crate::error::{Error, Result};
use std::fmt;
use url::Url;

/// A parsed source reference.
///
/// An absolute `http`/`https` URL is fetched over the network. A relative
/// path is read from the configured object store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceRef {
    Remote(Url),
    Stored(String),
}

impl SourceRef {
    /// Parse the raw source segment of a resize request.
    pub fn parse(raw: &str) -> Result<Self> {
        match Url::parse(raw) {
            Ok(url) => {
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(Error::InvalidSource(format!(
                        "scheme {:?} is not allowed",
                        url.scheme()
                    )));
                }
                if url.host_str().is_none_or(str::is_empty) {
                    return Err(Error::InvalidSource(format!("{raw:?} has no host")));
                }
                if url.path().ends_with('/') {
                    return Err(Error::InvalidSource(format!("{raw:?} names no file")));
                }
                Ok(Self::Remote(url))
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => parse_stored(raw),
            Err(e) => Err(Error::InvalidSource(format!("{raw:?}: {e}"))),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Host of a remote source.
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Remote(url) => url.host_str(),
            Self::Stored(_) => None,
        }
    }

    /// Path of the source with scheme and host removed, without a leading `/`.
    pub fn path(&self) -> &str {
        match self {
            Self::Remote(url) => url.path().trim_start_matches('/'),
            Self::Stored(key) => key,
        }
    }

    /// Query string of a remote source.
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Remote(url) => url.query().filter(|q| !q.is_empty()),
            Self::Stored(_) => None,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Stored(key) => write!(f, "{key}"),
        }
    }
}

fn parse_stored(raw: &str) -> Result<SourceRef> {
    let key = raw.trim_start_matches('/');
    if key.is_empty() {
        return Err(Error::InvalidSource("empty source path".to_string()));
    }
    if key.contains('\\') {
        return Err(Error::InvalidSource(format!(
            "{raw:?} contains a backslash"
        )));
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(Error::InvalidSource(format!(
                "{raw:?} contains an invalid path segment"
            )));
        }
    }
    Ok(SourceRef::Stored(key.to_string()))
}
