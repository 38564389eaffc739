//! Origin fetching: where source bytes come from.

use crate::metrics::ORIGIN_FETCH_DURATION;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::StatusCode;
use std::sync::Arc;
use vignette_core::SourceRef;
use vignette_core::config::FetchConfig;
use vignette_storage::ObjectStore;

/// Origin fetch errors.
#[derive(Clone, Debug, thiserror::Error)]
pub enum FetchError {
    #[error("origin returned status {0}")]
    UpstreamStatus(u16),

    #[error("source object not found: {0}")]
    NotFound(String),

    #[error("origin unreachable: {0}")]
    Transport(String),

    #[error("source image exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("source store failed: {0}")]
    Storage(String),
}

/// Retrieves raw source image bytes.
///
/// No retries: a failed fetch fails the request.
#[async_trait]
pub trait OriginFetcher: Send + Sync + 'static {
    async fn fetch(&self, source: &SourceRef) -> Result<Bytes, FetchError>;
}

/// Fetches remote sources over HTTP and stored sources from the object store.
pub struct DefaultOriginFetcher {
    client: reqwest::Client,
    store: Option<Arc<dyn ObjectStore>>,
    max_source_bytes: u64,
}

impl DefaultOriginFetcher {
    pub fn new(
        config: &FetchConfig,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            store,
            max_source_bytes: config.max_source_bytes,
        })
    }

    async fn fetch_remote(&self, url: &str) -> Result<Bytes, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::UpstreamStatus(status.as_u16()));
        }

        let limit = self.max_source_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::TooLarge { limit });
        }

        // Content-Length may be absent or wrong, so the cap is enforced on
        // what actually arrives.
        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
        {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }

    async fn fetch_stored(&self, key: &str) -> Result<Bytes, FetchError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| FetchError::Storage("no object store configured".to_string()))?;

        let data = store.get(key).await.map_err(|e| {
            if e.is_not_found() {
                FetchError::NotFound(key.to_string())
            } else {
                FetchError::Storage(e.to_string())
            }
        })?;

        if data.len() as u64 > self.max_source_bytes {
            return Err(FetchError::TooLarge {
                limit: self.max_source_bytes,
            });
        }
        Ok(data)
    }
}

#[async_trait]
impl OriginFetcher for DefaultOriginFetcher {
    async fn fetch(&self, source: &SourceRef) -> Result<Bytes, FetchError> {
        let (label, result) = match source {
            SourceRef::Remote(url) => {
                let _timer = ORIGIN_FETCH_DURATION
                    .with_label_values(&["remote"])
                    .start_timer();
                ("remote", self.fetch_remote(url.as_str()).await)
            }
            SourceRef::Stored(key) => {
                let _timer = ORIGIN_FETCH_DURATION
                    .with_label_values(&["stored"])
                    .start_timer();
                ("stored", self.fetch_stored(key).await)
            }
        };

        match &result {
            Ok(data) => tracing::debug!(source = label, size = data.len(), "Fetched source image"),
            Err(e) => tracing::warn!(source = label, error = %e, "Origin fetch failed"),
        }
        result
    }
}
