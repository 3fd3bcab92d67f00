use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipforge_core::{
    load_config, validate_config, FfmpegToolkit, MediaToolkit, Publisher, RenditionPipeline,
    RenditionStore, SqliteCredentialStore, SqliteRenditionStore, StorageLayout, TokenCipher,
    YouTubeHost,
};
use clipforge_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CLIPFORGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    // Fingerprint of the effective config, secret excluded
    let sanitized = clipforge_core::SanitizedConfig::from(&config);
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));

    info!(version = VERSION, config_hash = &config_hash[..16], "Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Storage root: {:?}", config.storage.root);

    // Credential vault
    let cipher = TokenCipher::from_secret(&config.vault.secret)
        .context("Failed to derive vault key")?;
    let credentials = Arc::new(
        SqliteCredentialStore::new(&config.database.path, cipher)
            .context("Failed to create credential store")?,
    );
    info!("Credential store initialized");

    // Source/rendition/job records
    let store: Arc<dyn RenditionStore> = Arc::new(
        SqliteRenditionStore::new(&config.database.path)
            .context("Failed to create rendition store")?,
    );
    info!("Rendition store initialized");

    // Media toolkit
    let toolkit = FfmpegToolkit::new(config.media.clone());
    match toolkit.validate().await {
        Ok(()) => info!("Using media toolkit: {}", toolkit.name()),
        Err(e) => warn!("Media toolkit unavailable, uploads will fail: {}", e),
    }

    // Media host
    let host = YouTubeHost::new(config.youtube.clone()).context("Failed to create YouTube host")?;
    info!("Publishing to {}", config.youtube.upload_base_url);

    let publisher = Arc::new(Publisher::new(
        Arc::clone(&store),
        credentials.clone(),
        Arc::new(host),
    ));
    let interrupted = publisher
        .fail_interrupted_jobs()
        .context("Failed to recover interrupted publish jobs")?;
    if interrupted > 0 {
        warn!("Marked {} interrupted publish jobs as failed", interrupted);
    }

    let layout = StorageLayout::new(config.storage.root.clone());
    let pipeline = Arc::new(RenditionPipeline::new(
        Arc::new(toolkit),
        store,
        credentials.clone(),
        publisher,
        layout.clone(),
        config.pipeline.clone(),
    ));
    info!(
        "Rendition pipeline ready (max {} parallel orientations)",
        config.pipeline.max_parallel_orientations
    );

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), pipeline, credentials, layout));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
