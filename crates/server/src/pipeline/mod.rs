//! The resize pipeline.
//!
//! A request moves strictly forward through
//! verify -> resolve size -> parse source -> derive key -> cache lookup
//! -> fetch -> render -> respond, with a background cache store after a fresh
//! render. Any stage can reject; a cache hit skips fetch and render.

pub mod cache;
pub mod fetch;
pub mod flight;
pub mod render;

use crate::error::{ApiError, ApiResult};
use bytes::Bytes;
use cache::ResultCache;
use fetch::OriginFetcher;
use flight::{FlightKey, SingleFlight};
use render::ThumbnailRenderer;
use std::sync::Arc;
use vignette_core::config::AppConfig;
use vignette_core::{
    CacheEntry, CacheKey, Dimensions, ImageKind, RenderResult, SizePolicy, SourceRef,
    ThumbnailRequest,
};
use vignette_signer::RequestSigner;
use vignette_storage::ObjectStore;

/// Where a served thumbnail came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThumbnailOrigin {
    Cache,
    Rendered,
}

impl ThumbnailOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "HIT",
            Self::Rendered => "MISS",
        }
    }
}

/// A thumbnail ready to be written to the client.
#[derive(Clone, Debug)]
pub struct Thumbnail {
    pub bytes: Bytes,
    pub content_type: ImageKind,
    pub etag: String,
    pub key: CacheKey,
    pub origin: ThumbnailOrigin,
}

impl From<CacheEntry> for Thumbnail {
    fn from(entry: CacheEntry) -> Self {
        Self {
            bytes: entry.bytes,
            content_type: entry.content_type,
            etag: entry.etag,
            key: entry.key,
            origin: ThumbnailOrigin::Cache,
        }
    }
}

impl From<RenderResult> for Thumbnail {
    fn from(result: RenderResult) -> Self {
        Self {
            bytes: result.bytes,
            content_type: result.content_type,
            etag: result.etag,
            key: result.storage_key,
            origin: ThumbnailOrigin::Rendered,
        }
    }
}

/// Request orchestrator shared by all requests.
///
/// Holds only read-only configuration and handles to shared backends, so one
/// instance serves every concurrent request.
pub struct Pipeline {
    signer: RequestSigner,
    sizes: SizePolicy,
    cache_prefix: String,
    include_host: bool,
    fetcher: Arc<dyn OriginFetcher>,
    renderer: ThumbnailRenderer,
    has_store: bool,
    cache: Option<ResultCache>,
    flights: Option<SingleFlight>,
}

impl Pipeline {
    /// Assemble the pipeline. Starts the cache writer pool when caching is
    /// enabled, so it must be called inside a Tokio runtime.
    pub fn new(
        config: &AppConfig,
        signer: RequestSigner,
        fetcher: Arc<dyn OriginFetcher>,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        let cache = match &store {
            Some(store) if config.cache.enabled => {
                Some(ResultCache::new(store.clone(), &config.cache))
            }
            _ => None,
        };

        Self {
            signer,
            sizes: config.sizes.clone(),
            cache_prefix: config.cache.prefix.clone(),
            include_host: config.cache.include_host,
            fetcher,
            renderer: ThumbnailRenderer::new(&config.render),
            has_store: store.is_some(),
            cache,
            flights: config.cache.single_flight.then(SingleFlight::new),
        }
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    pub fn sizes(&self) -> &SizePolicy {
        &self.sizes
    }

    /// Serve one request.
    pub async fn handle(&self, request: &ThumbnailRequest) -> ApiResult<Thumbnail> {
        let signature = request
            .signature
            .as_deref()
            .ok_or_else(|| ApiError::Auth("missing Signature header".to_string()))?;
        self.signer.verify(signature, &request.raw_request_path)?;

        let target = self.sizes.resolve(&request.size_token)?;

        let source = SourceRef::parse(&request.source_ref)?;
        if !source.is_remote() && !self.has_store {
            return Err(ApiError::BadSource(format!(
                "no object store configured for stored source {source:?}",
                source = source.path()
            )));
        }

        let key = CacheKey::derive(
            &self.cache_prefix,
            &source,
            &request.size_token,
            self.include_host,
        );

        if let Some(cache) = &self.cache
            && let Some(entry) = cache.lookup(&key).await
        {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(entry.into());
        }

        tracing::debug!(key = %key, source = %source, size = %target, "Cache miss, rendering");
        let flight_key = FlightKey::new(&source, &request.size_token);
        let result = self.render_detached(source, target, key, flight_key).await?;
        Ok(result.into())
    }

    /// Fetch and render on a task of its own, coalesced per source and size
    /// when single-flight is on. The cache store is scheduled from that task,
    /// once per render, whether or not the caller is still waiting.
    async fn render_detached(
        &self,
        source: SourceRef,
        target: Dimensions,
        key: CacheKey,
        flight_key: FlightKey,
    ) -> ApiResult<RenderResult> {
        let fetcher = self.fetcher.clone();
        let renderer = self.renderer.clone();
        let cache = self.cache.clone();

        let work = async move {
            let bytes = fetcher.fetch(&source).await?;
            let result = renderer.render_async(bytes, target, key).await?;
            if let Some(cache) = cache {
                cache.store(result.clone());
            }
            Ok::<_, ApiError>(result)
        };

        match &self.flights {
            Some(flights) => flights.run(&flight_key, work).await.0,
            None => tokio::spawn(work)
                .await
                .map_err(|e| ApiError::Internal(format!("render task failed: {e}")))?,
        }
    }
}
