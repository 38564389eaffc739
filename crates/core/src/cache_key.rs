//! Deterministic storage keys for rendered thumbnails.

use crate::source::SourceRef;
use std::fmt;

/// Default key namespace for rendered results.
pub const DEFAULT_CACHE_PREFIX: &str = "cache";

/// Storage key of a rendered thumbnail.
///
/// Layout is `<prefix>/<source dir>/<size token>/<source file>`. The size token
/// always sits between the directory and the file, so keys for different
/// sizes of the same source share a directory but never collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a `(source, size token)` pair.
    ///
    /// Scheme and host of remote sources are dropped unless `include_host` is
    /// set, in which case the host becomes the first directory segment. A
    /// query string is kept on the file segment.
    pub fn derive(prefix: &str, source: &SourceRef, size_token: &str, include_host: bool) -> Self {
        let mut segments: Vec<&str> = Vec::new();

        let prefix = prefix.trim_matches('/');
        if !prefix.is_empty() {
            segments.push(prefix);
        }

        if include_host && let Some(host) = source.host() {
            segments.push(host);
        }

        let path = source.path();
        let (dir, file) = match path.rsplit_once('/') {
            Some((dir, file)) => (dir, file),
            None => ("", path),
        };
        segments.extend(dir.split('/').filter(|s| !s.is_empty()));
        segments.push(size_token);

        let mut key = segments.join("/");
        key.push('/');
        key.push_str(file);
        if let Some(query) = source.query() {
            key.push('?');
            key.push_str(query);
        }

        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
