//! vignette server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vignette_core::config::AppConfig;
use vignette_server::{AppState, create_router};
use vignette_signer::{RequestSigner, load_secret};

/// vignette - an on-demand image thumbnailing proxy
#[derive(Parser, Debug)]
#[command(name = "vignetted")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "VIGNETTE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("vignette v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    let warnings = config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    vignette_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    // Optional: without a store there is no cache and no stored sources.
    let storage = match &config.storage {
        Some(storage_config) => {
            let storage = vignette_storage::from_config(storage_config)
                .await
                .context("failed to initialize storage")?;
            storage
                .health_check()
                .await
                .context("storage health check failed")?;
            tracing::info!(
                backend = storage.backend_name(),
                "Storage backend connectivity verified"
            );
            Some(storage)
        }
        None => {
            tracing::warn!("No storage configured, thumbnails will not be cached");
            None
        }
    };

    let secret = load_secret(&config.signing.secret).context("failed to load signing secret")?;
    let signer = RequestSigner::new(config.signing.algorithm, &secret)
        .context("failed to initialize request signer")?;
    tracing::info!(algorithm = ?config.signing.algorithm, "Request signer ready");

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let sizes: Vec<String> = config.sizes.tokens().map(str::to_string).collect();
    tracing::info!(sizes = ?sizes, caching = config.caching_enabled(), "Size policy loaded");

    let state = AppState::new(config, signer, storage)
        .map_err(|e| anyhow::anyhow!("failed to initialize application state: {e}"))?;
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Load configuration from the optional TOML file and `VIGNETTE_` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // VIGNETTE_CONFIG is just the path
    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with("VIGNETTE_") && key != "VIGNETTE_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: vignetted --config /path/to/config.toml\n  \
             2. Environment variables: VIGNETTE_SIGNING__SECRET__TYPE=env \
             VIGNETTE_SIGNING__SECRET__VAR=THUMB_SECRET VIGNETTE_SIZES__THUMB=100x100 vignetted\n\n\
             See config/server.example.toml for example configuration.\n\
             Set VIGNETTE_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    figment
        .merge(Env::prefixed("VIGNETTE_").split("__"))
        .extract()
        .context("failed to load configuration")
}
