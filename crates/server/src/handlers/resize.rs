//! Resize endpoint.

use crate::error::ApiError;
use crate::metrics;
use crate::pipeline::{Thumbnail, ThumbnailOrigin};
use crate::state::AppState;
use crate::trace::TraceId;
use axum::Extension;
use axum::body::Body;
use axum::extract::{OriginalUri, Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, EXPIRES};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;
use time::macros::format_description;
use vignette_core::ThumbnailRequest;
use vignette_core::config::CacheControlConfig;

/// Request header carrying the base64 HMAC of the request path.
pub const SIGNATURE_HEADER: &str = "signature";

/// Response header telling whether the thumbnail came from the cache.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// GET /resize/{size}/{*source}
///
/// The signature covers the path exactly as it arrived, still escaped.
pub async fn resize(
    State(state): State<AppState>,
    Path((size, source)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    Extension(trace_id): Extension<TraceId>,
    headers: HeaderMap,
) -> Response {
    let request = ThumbnailRequest {
        source_ref: source,
        size_token: size,
        signature: headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        raw_request_path: uri.path().to_string(),
    };

    match state.pipeline.handle(&request).await {
        Ok(thumbnail) => {
            metrics::record_request(match thumbnail.origin {
                ThumbnailOrigin::Cache => "hit",
                ThumbnailOrigin::Rendered => "rendered",
            });
            thumbnail_response(thumbnail, &state.config.cache_control)
        }
        Err(e) => {
            metrics::record_request(e.code());
            log_rejection(&trace_id, &request, &e);
            e.into_response()
        }
    }
}

fn log_rejection(trace_id: &TraceId, request: &ThumbnailRequest, err: &ApiError) {
    if err.status_code().is_server_error() {
        tracing::error!(
            trace_id = %trace_id,
            size = %request.size_token,
            source = %request.source_ref,
            code = err.code(),
            error = %err,
            "Resize request failed"
        );
    } else {
        tracing::info!(
            trace_id = %trace_id,
            size = %request.size_token,
            code = err.code(),
            error = %err,
            "Resize request rejected"
        );
    }
}

fn thumbnail_response(thumbnail: Thumbnail, cache_control: &CacheControlConfig) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(thumbnail.content_type.content_type()),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(thumbnail.bytes.len()));
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", thumbnail.etag)) {
        headers.insert(ETAG, etag);
    }
    if let Ok(value) = HeaderValue::from_str(&cache_control.header_value()) {
        headers.insert(CACHE_CONTROL, value);
    }
    if cache_control.expires_header
        && let Some(expires) = expires_at(OffsetDateTime::now_utc(), cache_control.max_age_secs)
        && let Ok(value) = HeaderValue::from_str(&expires)
    {
        headers.insert(EXPIRES, value);
    }
    headers.insert(X_CACHE, HeaderValue::from_static(thumbnail.origin.as_str()));

    (StatusCode::OK, headers, Body::from(thumbnail.bytes)).into_response()
}

/// `now + max_age` as an IMF-fixdate, or `None` if it does not fit.
fn expires_at(now: OffsetDateTime, max_age_secs: u64) -> Option<String> {
    let max_age = time::Duration::seconds(i64::try_from(max_age_secs).ok()?);
    let expires = now.checked_add(max_age)?;
    expires
        .format(format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_expires_is_imf_fixdate() {
        let now = datetime!(1994-11-05 08:49:37 UTC);
        assert_eq!(
            expires_at(now, 86400).as_deref(),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
    }

    #[test]
    fn test_expires_out_of_range_is_skipped() {
        let now = datetime!(2024-01-01 00:00:00 UTC);
        assert_eq!(expires_at(now, u64::MAX), None);
        assert_eq!(expires_at(now, i64::MAX as u64), None);
    }
}
