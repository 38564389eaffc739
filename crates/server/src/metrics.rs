//! Prometheus metrics for the thumbnail proxy.
//!
//! Besides request outcomes, these counters are where the background cache
//! writer reports what it could not do: failed and dropped stores never reach
//! a client, so this is the only place they show up apart from the logs.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! It exposes aggregate traffic only, no source URLs or cache keys. Restrict
//! it to scraper IPs at the network level or disable it with
//! `server.metrics_enabled = false`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Request metrics
pub static RESIZE_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vignette_resize_requests_total",
            "Total resize requests by outcome (hit, rendered or error code)",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

// Cache lookup metrics
pub static CACHE_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vignette_cache_hits_total",
        "Total cache lookups that found a rendered thumbnail",
    )
    .expect("metric creation failed")
});

pub static CACHE_MISSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vignette_cache_misses_total",
        "Total cache lookups that found nothing",
    )
    .expect("metric creation failed")
});

pub static CACHE_LOOKUP_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vignette_cache_lookup_errors_total",
        "Total cache lookups that failed and were treated as a miss",
    )
    .expect("metric creation failed")
});

// Cache store metrics
pub static CACHE_STORES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vignette_cache_stores_total",
            "Total background cache stores by result (completed, failed, dropped)",
        ),
        &["result"],
    )
    .expect("metric creation failed")
});

pub static STORE_QUEUE_DEPTH: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "vignette_cache_store_queue_depth",
        "Rendered results waiting for a cache writer",
    )
    .expect("metric creation failed")
});

pub static SINGLE_FLIGHT_COALESCED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vignette_single_flight_coalesced_total",
        "Total requests that awaited an identical in-flight render instead of rendering",
    )
    .expect("metric creation failed")
});

// Timing metrics
pub static ORIGIN_FETCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vignette_origin_fetch_duration_seconds",
            "Time taken to fetch a source image",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["source"],
    )
    .expect("metric creation failed")
});

pub static RENDER_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "vignette_render_duration_seconds",
            "Time taken to decode, resize and encode a thumbnail",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(RESIZE_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_MISSES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_LOOKUP_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_STORES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STORE_QUEUE_DEPTH.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SINGLE_FLIGHT_COALESCED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ORIGIN_FETCH_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RENDER_DURATION.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Count a finished resize request.
pub fn record_request(outcome: &str) {
    RESIZE_REQUESTS.with_label_values(&[outcome]).inc();
}

/// Count a background cache store by result.
pub fn record_store(result: &str) {
    CACHE_STORES.with_label_values(&[result]).inc();
}
