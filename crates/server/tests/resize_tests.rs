//! End-to-end tests for the resize endpoint.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use common::*;
use httpmock::prelude::*;
use image::ImageFormat;
use vignette_core::content_etag;
use vignette_storage::ObjectStore;

fn resize_path(size: &str, source: &str) -> String {
    format!("/resize/{size}/{}", escape_source(source))
}

fn header<'a>(response: &'a axum::http::Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

macro_rules! require_localhost {
    () => {
        if !can_bind_localhost() {
            eprintln!("skipping: cannot bind localhost for mock origin");
            return;
        }
    };
}

#[tokio::test]
async fn test_miss_renders_stores_then_hits() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    let mock = origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200)
                .header("content-type", "image/jpeg")
                .body(jpeg_bytes(400, 300).to_vec());
        })
        .await;

    let server = TestServer::new().await;
    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-cache"), Some("MISS"));
    assert_eq!(header(&response, "content-type"), Some("image/jpeg"));
    let first = body_bytes(response).await;
    assert_eq!(decoded_dimensions(&first), (100, 100, ImageFormat::Jpeg));

    server.wait_for_stores(1).await;
    let stored = server.storage().get("cache/thumb/a.jpg").await.unwrap();
    assert_eq!(stored, first);

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-cache"), Some("HIT"));
    let second = body_bytes(response).await;
    assert_eq!(second, first);

    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_response_cache_headers() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200).body(jpeg_bytes(200, 200).to_vec());
        })
        .await;

    let server = TestServer::new().await;
    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));
    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(header(&response, "cache-control"), Some("max-age=86400,public"));
    let expires = header(&response, "expires").expect("Expires header missing");
    assert!(expires.ends_with(" GMT"), "unexpected Expires: {expires}");
    let etag = header(&response, "etag").unwrap().to_string();
    let length: usize = header(&response, "content-length").unwrap().parse().unwrap();

    let body = body_bytes(response).await;
    assert_eq!(etag, format!("\"{}\"", content_etag(&body)));
    assert_eq!(length, body.len());
}

#[tokio::test]
async fn test_expires_header_can_be_disabled() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200).body(jpeg_bytes(120, 80).to_vec());
        })
        .await;

    let server = TestServer::with_config(|config| {
        config.cache_control.max_age_secs = 60;
        config.cache_control.expires_header = false;
    })
    .await;
    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));
    let response = server.get_signed(&path).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "cache-control"), Some("max-age=60,public"));
    assert!(header(&response, "expires").is_none());
}

#[tokio::test]
async fn test_missing_or_wrong_signature_is_rejected_before_fetch() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    let mock = origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200).body(jpeg_bytes(64, 64).to_vec());
        })
        .await;

    let server = TestServer::new().await;
    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));

    let response = server.get(&path).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Signed for another size
    let other = resize_path("wide", &format!("http://{}/a.jpg", origin.address()));
    let request = Request::builder()
        .uri(&path)
        .header("Signature", server.sign(&other))
        .body(Body::empty())
        .unwrap();
    let response = server.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri(&path)
        .header("Signature", "not base64 at all!")
        .body(Body::empty())
        .unwrap();
    let response = server.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_bytes(response).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text.starts_with("unauthorized: "));
    assert!(!text.contains("unauthorized: unauthorized"));

    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn test_unknown_size_is_bad_request() {
    let server = TestServer::new().await;
    let path = resize_path("huge", "http://example.com/a.jpg");

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_bytes(response).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("invalid size"), "unexpected body: {text}");
}

#[tokio::test]
async fn test_rejected_resize_keeps_client_trace_id() {
    let server = TestServer::new().await;
    let path = resize_path("huge", "http://example.com/a.jpg");

    let request = Request::builder()
        .uri(&path)
        .header("Signature", server.sign(&path))
        .header("X-Trace-Id", "resize-trace-7")
        .body(Body::empty())
        .unwrap();
    let response = server.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(header(&response, "x-trace-id"), Some("resize-trace-7"));
}

#[tokio::test]
async fn test_disallowed_scheme_is_unprocessable() {
    let server = TestServer::new().await;
    let path = resize_path("thumb", "ftp://example.com/a.jpg");

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_bytes(response).await;
    assert!(String::from_utf8_lossy(&body).starts_with("bad_source"));
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway_and_not_cached() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    let mock = origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(500);
        })
        .await;

    let server = TestServer::new().await;
    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    assert_eq!(mock.hits_async().await, 2);
    assert!(
        server
            .storage()
            .get("cache/thumb/a.jpg")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_undecodable_source_is_render_error() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200).body("<html>not an image</html>");
        })
        .await;

    let server = TestServer::new().await;
    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_bytes(response).await;
    assert!(String::from_utf8_lossy(&body).starts_with("render_error"));
}

#[tokio::test]
async fn test_png_source_stays_png() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    origin
        .mock_async(|when, then| {
            when.method(GET).path("/icons/logo.png");
            then.status(200).body(png_bytes(320, 320).to_vec());
        })
        .await;

    let server = TestServer::new().await;
    let path = resize_path(
        "thumb",
        &format!("http://{}/icons/logo.png", origin.address()),
    );

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("image/png"));
    let body = body_bytes(response).await;
    assert_eq!(decoded_dimensions(&body), (100, 100, ImageFormat::Png));

    server.wait_for_stores(1).await;
    assert!(
        server
            .storage()
            .get("cache/icons/thumb/logo.png")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_stored_source_is_read_from_object_store() {
    let server = TestServer::new().await;
    server
        .storage()
        .put("photos/cat.png", png_bytes(640, 480))
        .await
        .unwrap();

    let path = resize_path("wide", "photos/cat.png");
    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-cache"), Some("MISS"));
    let body = body_bytes(response).await;
    assert_eq!(decoded_dimensions(&body), (160, 90, ImageFormat::Png));

    server.wait_for_stores(1).await;
    let stored = server
        .storage()
        .get("cache/photos/wide/cat.png")
        .await
        .unwrap();
    assert_eq!(stored, body);
}

#[tokio::test]
async fn test_unescaped_stored_source_is_accepted() {
    let server = TestServer::new().await;
    server
        .storage()
        .put("photos/cat.jpg", jpeg_bytes(300, 300))
        .await
        .unwrap();

    // The signature covers the path as sent, slashes and all
    let path = "/resize/thumb/photos/cat.jpg";
    let response = server.get_signed(path).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert_eq!(decoded_dimensions(&body), (100, 100, ImageFormat::Jpeg));
}

#[tokio::test]
async fn test_missing_stored_source_is_not_found() {
    let server = TestServer::new().await;
    let path = resize_path("thumb", "photos/missing.jpg");

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_bytes(response).await;
    assert!(String::from_utf8_lossy(&body).starts_with("upstream_error"));
}

#[tokio::test]
async fn test_stored_source_without_store_is_unprocessable() {
    let server = TestServer::with_config(|config| config.storage = None).await;
    let path = resize_path("thumb", "photos/cat.jpg");

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_cache_disabled_renders_every_time() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    let mock = origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200).body(jpeg_bytes(200, 150).to_vec());
        })
        .await;

    let server = TestServer::with_config(|config| config.cache.enabled = false).await;
    assert!(server.state.pipeline.cache().is_none());
    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));

    for _ in 0..2 {
        let response = server.get_signed(&path).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-cache"), Some("MISS"));
    }

    assert_eq!(mock.hits_async().await, 2);
    assert!(
        server
            .storage()
            .get("cache/thumb/a.jpg")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_include_host_namespaces_cache_keys() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200).body(jpeg_bytes(200, 150).to_vec());
        })
        .await;

    let server = TestServer::with_config(|config| config.cache.include_host = true).await;
    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));

    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::OK);

    server.wait_for_stores(1).await;
    let storage = server.storage();
    assert!(storage.get("cache/127.0.0.1/thumb/a.jpg").await.is_ok());
    assert!(
        storage
            .get("cache/thumb/a.jpg")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_corrupt_cache_entry_is_treated_as_miss() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    let mock = origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200).body(jpeg_bytes(200, 150).to_vec());
        })
        .await;

    let server = TestServer::new().await;
    server
        .storage()
        .put("cache/thumb/a.jpg", Bytes::from_static(b"truncated garbage"))
        .await
        .unwrap();

    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));
    let response = server.get_signed(&path).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-cache"), Some("MISS"));
    let body = body_bytes(response).await;

    // The fresh render replaces the bad entry
    server.wait_for_stores(1).await;
    let stored = server.storage().get("cache/thumb/a.jpg").await.unwrap();
    assert_eq!(stored, body);
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_concurrent_misses_fetch_once() {
    require_localhost!();
    let origin = MockServer::start_async().await;
    let mock = origin
        .mock_async(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200)
                .delay(std::time::Duration::from_millis(200))
                .body(jpeg_bytes(400, 300).to_vec());
        })
        .await;

    let server = TestServer::new().await;
    let path = resize_path("thumb", &format!("http://{}/a.jpg", origin.address()));

    let responses = futures::future::join_all((0..4).map(|_| server.get_signed(&path))).await;
    for response in responses {
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(mock.hits_async().await, 1);
}
