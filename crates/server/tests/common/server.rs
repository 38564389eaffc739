//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use vignette_core::config::{AppConfig, StorageConfig};
use vignette_server::{AppState, create_router};
use vignette_signer::{RequestSigner, load_secret};
use vignette_storage::ObjectStore;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    signer: RequestSigner,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server backed by a temporary filesystem store.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    ///
    /// The filesystem store is configured before `modifier` runs, so a
    /// modifier can still remove it.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage_path = temp_dir.path().join("storage");
        std::fs::create_dir_all(&storage_path).expect("Failed to create storage directory");

        let mut config = AppConfig::for_testing();
        config.storage = Some(StorageConfig::Filesystem { path: storage_path });
        modifier(&mut config);

        let storage = match &config.storage {
            Some(storage_config) => Some(
                vignette_storage::from_config(storage_config)
                    .await
                    .expect("Failed to create storage backend"),
            ),
            None => None,
        };

        let secret = load_secret(&config.signing.secret).expect("Failed to load secret");
        let signer =
            RequestSigner::new(config.signing.algorithm, &secret).expect("Failed to build signer");

        vignette_server::metrics::register_metrics();

        let state = AppState::new(config, signer.clone(), storage)
            .expect("Failed to create application state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            signer,
            _temp_dir: temp_dir,
        }
    }

    /// Object store behind the server.
    pub fn storage(&self) -> Arc<dyn ObjectStore> {
        self.state.storage.clone().expect("Test server has no storage")
    }

    /// Signature for a request path, as a client holding the secret would compute it.
    pub fn sign(&self, path: &str) -> String {
        self.signer.sign(path)
    }

    /// Send an unsigned GET.
    pub async fn get(&self, path: &str) -> Response<Body> {
        self.send(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
    }

    /// Send a GET carrying a valid signature for `path`.
    pub async fn get_signed(&self, path: &str) -> Response<Body> {
        let request = Request::builder()
            .uri(path)
            .header("Signature", self.sign(path))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Wait until `count` background cache stores have finished.
    pub async fn wait_for_stores(&self, count: u64) {
        let cache = self
            .state
            .pipeline
            .cache()
            .expect("Test server has caching disabled");
        for _ in 0..200 {
            let stats = cache.stats();
            if stats.completed + stats.failed >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting for {count} cache stores: {:?}", cache.stats());
    }
}

/// Read a whole response body.
#[allow(dead_code)]
pub async fn body_bytes(response: Response<Body>) -> bytes::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}
