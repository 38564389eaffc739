//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Object store abstraction shared by stored sources and rendered results.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically. An existing object is replaced.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.put_with_options(key, data, &PutOptions::default()).await
    }

    /// Put an object with per-object metadata.
    ///
    /// Backends that cannot record a piece of metadata ignore it.
    async fn put_with_options(
        &self,
        key: &str,
        data: Bytes,
        options: &PutOptions,
    ) -> StorageResult<()>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "s3", "filesystem").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity without writing anything.
    ///
    /// Runs at startup, so a misconfigured backend stops the server before it
    /// accepts requests, and again on every `/v1/health` request.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata attached to an object on write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// MIME type recorded with the object.
    pub content_type: Option<String>,
}

impl PutOptions {
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
        }
    }
}
