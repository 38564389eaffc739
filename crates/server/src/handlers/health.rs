//! Health endpoint.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Object store backend, or `"none"` when running without one.
    pub storage: &'static str,
    pub caching: bool,
    /// Configured size tokens.
    pub sizes: Vec<String>,
}

/// GET /v1/health
///
/// Unauthenticated for load balancers. Fails with 503 when the configured
/// object store does not answer.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let storage = match &state.storage {
        Some(store) => {
            store
                .health_check()
                .await
                .map_err(|e| ApiError::StorageUnavailable(e.to_string()))?;
            store.backend_name()
        }
        None => "none",
    };

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage,
        caching: state.pipeline.cache().is_some(),
        sizes: state.pipeline.sizes().tokens().map(str::to_string).collect(),
    }))
}
