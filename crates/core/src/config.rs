//! Configuration types shared across crates.

use crate::cache_key::DEFAULT_CACHE_PREFIX;
use crate::size::SizePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// HMAC digest used for request signatures.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SigningAlgorithm {
    #[default]
    HmacSha256,
    HmacSha512,
    /// Compatible with signatures minted as `HMAC(SHA3-256)`.
    #[serde(rename = "hmac-sha3-256")]
    HmacSha3_256,
}

/// Request signing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Digest algorithm (default: hmac-sha256).
    #[serde(default)]
    pub algorithm: SigningAlgorithm,
    /// Shared secret source.
    pub secret: SecretConfig,
}

impl SigningConfig {
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        match &self.secret {
            SecretConfig::Value { key } => {
                if key.is_empty() {
                    return Err("signing.secret.key cannot be empty".to_string());
                }
                warnings.push(
                    "signing.secret is set inline. Prefer type = \"file\" or type = \"env\" \
                     so the secret stays out of config files."
                        .to_string(),
                );
            }
            SecretConfig::Env { var } if var.is_empty() => {
                return Err("signing.secret.var cannot be empty".to_string());
            }
            _ => {}
        }
        Ok(warnings)
    }
}

/// Shared secret source configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SecretConfig {
    /// Secret stored in a file. Trailing whitespace is ignored.
    File {
        /// Path to the secret file.
        path: PathBuf,
    },
    /// Secret stored in environment variable.
    Env {
        /// Environment variable name.
        var: String,
    },
    /// Secret provided directly as a value (NOT recommended for production).
    Value {
        /// The secret itself.
        key: String,
    },
}

/// Thumbnail rendering configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Crop to the target aspect ratio around the centre before scaling.
    /// When false the image is scaled to the exact size and may be distorted.
    #[serde(default = "default_crop")]
    pub crop: bool,
    /// JPEG encoder quality, 1 to 100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Upper bound on decode + resize + encode, in seconds.
    #[serde(default = "default_render_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_crop() -> bool {
    true
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_render_timeout_secs() -> u64 {
    30
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            crop: default_crop(),
            jpeg_quality: default_jpeg_quality(),
            timeout_secs: default_render_timeout_secs(),
        }
    }
}

impl RenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "render.jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        if self.timeout_secs == 0 {
            return Err("render.timeout_secs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Origin fetch configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout for remote sources, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    /// TCP/TLS connect timeout for remote sources, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Largest source body accepted, in bytes.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: u64,
    /// User-Agent sent to remote origins.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_source_bytes() -> u64 {
    32 * 1024 * 1024
}

fn default_user_agent() -> String {
    concat!("vignette/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_source_bytes: default_max_source_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("fetch.timeout_secs cannot be 0".to_string());
        }
        if self.connect_timeout_secs == 0 {
            return Err("fetch.connect_timeout_secs cannot be 0".to_string());
        }
        if self.max_source_bytes == 0 {
            return Err("fetch.max_source_bytes cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Result cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Look up and store rendered results (requires `storage`).
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Key namespace for rendered results.
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
    /// Keep the origin host as the first directory of the cache key.
    /// Off by default, so `http://a/x.jpg` and `http://b/x.jpg` share an entry.
    #[serde(default)]
    pub include_host: bool,
    /// Collapse concurrent misses for one key into a single render.
    #[serde(default = "default_single_flight")]
    pub single_flight: bool,
    /// Pending stores held before new ones are dropped.
    #[serde(default = "default_store_queue_capacity")]
    pub store_queue_capacity: usize,
    /// Background tasks draining the store queue.
    #[serde(default = "default_store_workers")]
    pub store_workers: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_prefix() -> String {
    DEFAULT_CACHE_PREFIX.to_string()
}

fn default_single_flight() -> bool {
    true
}

fn default_store_queue_capacity() -> usize {
    256
}

fn default_store_workers() -> usize {
    4
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            prefix: default_cache_prefix(),
            include_host: false,
            single_flight: default_single_flight(),
            store_queue_capacity: default_store_queue_capacity(),
            store_workers: default_store_workers(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.store_queue_capacity == 0 {
            // tokio::sync::mpsc::channel panics on a zero capacity
            return Err("cache.store_queue_capacity cannot be 0".to_string());
        }
        if self.store_workers == 0 {
            return Err("cache.store_workers cannot be 0".to_string());
        }
        if self.prefix.split('/').any(|s| s == "..") {
            return Err(format!("cache.prefix {:?} is not a valid key prefix", self.prefix));
        }
        Ok(())
    }
}

/// Client-facing cache headers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheControlConfig {
    /// `max-age` advertised in `Cache-Control`.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Also send an `Expires` header of now + max-age.
    #[serde(default = "default_expires_header")]
    pub expires_header: bool,
}

fn default_max_age_secs() -> u64 {
    86400 // 1 day
}

fn default_expires_header() -> bool {
    true
}

impl Default for CacheControlConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            expires_header: default_expires_header(),
        }
    }
}

impl CacheControlConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn header_value(&self) -> String {
        format!("max-age={},public", self.max_age_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        // time::Duration is i64-backed
        if self.max_age_secs > i64::MAX as u64 {
            return Err(format!(
                "cache_control.max_age_secs {} exceeds maximum value {}",
                self.max_age_secs,
                i64::MAX
            ));
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (required for MinIO).
        #[serde(default)]
        force_path_style: bool,
        /// Storage class applied to rendered thumbnails, e.g. `REDUCED_REDUNDANCY`.
        /// Thumbnails can always be re-rendered, so a cheaper class is usually fine.
        #[serde(default)]
        storage_class: Option<String>,
    },
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a non-empty bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem { path } => {
                if path.as_os_str().is_empty() {
                    return Err("filesystem storage requires a path".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Request signing configuration (required).
    pub signing: SigningConfig,
    /// Size token allow-list.
    #[serde(default)]
    pub sizes: SizePolicy,
    /// Rendering configuration.
    #[serde(default)]
    pub render: RenderConfig,
    /// Origin fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Result cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Response cache headers.
    #[serde(default)]
    pub cache_control: CacheControlConfig,
    /// Backing store for stored sources and rendered results.
    /// Without one, only remote sources work and nothing is cached.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses an inline signing secret, a pair of size
    /// tokens and no storage backend.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            signing: SigningConfig {
                algorithm: SigningAlgorithm::HmacSha256,
                secret: SecretConfig::Value {
                    key: "test-signing-secret".to_string(),
                },
            },
            sizes: SizePolicy::from_map([("thumb", "100x100"), ("wide", "160x90")]),
            render: RenderConfig::default(),
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            cache_control: CacheControlConfig::default(),
            storage: None,
        }
    }

    /// Whether rendered results are looked up and stored.
    pub fn caching_enabled(&self) -> bool {
        self.cache.enabled && self.storage.is_some()
    }

    /// Validate every section.
    ///
    /// Returns warnings for settings that are allowed but suspicious, and an
    /// error for settings the server cannot run with.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        warnings.extend(self.signing.validate()?);
        warnings.extend(self.sizes.validate()?);
        self.render.validate()?;
        self.fetch.validate()?;
        self.cache.validate()?;
        self.cache_control.validate()?;

        match &self.storage {
            Some(storage) => storage.validate()?,
            None if self.cache.enabled => warnings.push(
                "cache.enabled is set but no storage is configured; rendered thumbnails \
                 will not be cached and stored sources are unavailable"
                    .to_string(),
            ),
            None => {}
        }

        Ok(warnings)
    }
}
