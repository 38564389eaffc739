//! Request and result types flowing through the resize pipeline.

use crate::cache_key::CacheKey;
use crate::hash::content_etag;
use crate::image::ImageKind;
use bytes::Bytes;

/// An inbound resize request, as taken off the wire.
///
/// Nothing here is validated yet. `raw_request_path` is the escaped path the
/// client signed and must reach the verifier byte for byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub source_ref: String,
    pub size_token: String,
    pub signature: Option<String>,
    pub raw_request_path: String,
}

/// A freshly rendered thumbnail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderResult {
    pub bytes: Bytes,
    pub content_type: ImageKind,
    pub content_length: u64,
    pub etag: String,
    pub storage_key: CacheKey,
}

impl RenderResult {
    /// Build a result from encoded bytes, hashing them for the entity tag.
    pub fn new(bytes: Bytes, content_type: ImageKind, storage_key: CacheKey) -> Self {
        Self {
            content_length: bytes.len() as u64,
            etag: content_etag(&bytes),
            bytes,
            content_type,
            storage_key,
        }
    }
}

/// A rendered thumbnail as persisted in the backing store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub bytes: Bytes,
    pub content_type: ImageKind,
    pub content_length: u64,
    pub etag: String,
}

impl CacheEntry {
    /// Rebuild an entry from bytes read back out of storage.
    ///
    /// Metadata is recomputed from the content, so every backend serves the
    /// same headers regardless of what object metadata it kept.
    pub fn from_stored(key: CacheKey, bytes: Bytes) -> crate::Result<Self> {
        let content_type = ImageKind::classify(&bytes)?;
        Ok(Self {
            content_length: bytes.len() as u64,
            etag: content_etag(&bytes),
            key,
            bytes,
            content_type,
        })
    }
}

impl From<RenderResult> for CacheEntry {
    fn from(result: RenderResult) -> Self {
        Self {
            key: result.storage_key,
            bytes: result.bytes,
            content_type: result.content_type,
            content_length: result.content_length,
            etag: result.etag,
        }
    }
}
