//! HTTP thumbnail proxy.
//!
//! This crate provides:
//! - The resize pipeline: signature check, size resolution, cache lookup,
//!   origin fetch, render and background cache store
//! - The axum router for `/resize`, `/v1/health` and `/metrics`
//! - Prometheus metrics and request tracing

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod trace;

pub use error::{ApiError, ApiResult};
pub use pipeline::{Pipeline, Thumbnail, ThumbnailOrigin};
pub use routes::create_router;
pub use state::AppState;
pub use trace::TraceId;
