//! Application state shared across handlers.

use crate::error::{ApiError, ApiResult};
use crate::pipeline::Pipeline;
use crate::pipeline::fetch::{DefaultOriginFetcher, OriginFetcher};
use std::sync::Arc;
use vignette_core::config::AppConfig;
use vignette_signer::RequestSigner;
use vignette_storage::ObjectStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object store for stored sources and rendered results, if configured.
    pub storage: Option<Arc<dyn ObjectStore>>,
    /// Request pipeline.
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Create application state with the HTTP/object-store origin fetcher.
    pub fn new(
        config: AppConfig,
        signer: RequestSigner,
        storage: Option<Arc<dyn ObjectStore>>,
    ) -> ApiResult<Self> {
        let fetcher = DefaultOriginFetcher::new(&config.fetch, storage.clone())
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(Self::with_fetcher(config, signer, storage, Arc::new(fetcher)))
    }

    /// Create application state with a custom origin fetcher.
    pub fn with_fetcher(
        config: AppConfig,
        signer: RequestSigner,
        storage: Option<Arc<dyn ObjectStore>>,
        fetcher: Arc<dyn OriginFetcher>,
    ) -> Self {
        let pipeline = Pipeline::new(&config, signer, fetcher, storage.clone());
        Self {
            config: Arc::new(config),
            storage,
            pipeline: Arc::new(pipeline),
        }
    }
}
