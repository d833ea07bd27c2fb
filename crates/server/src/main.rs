use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use personaforge_core::{
    create_credential_provider, load_config, validate_config, GeminiClient, GenerationPipeline,
    Providers,
};

use personaforge_server::api::{create_router, spawn_forwarder, WsBroadcaster};
use personaforge_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    // PERSONAFORGE_LOG_FORMAT=json switches to structured output
    let json = std::env::var("PERSONAFORGE_LOG_FORMAT").is_ok_and(|f| f == "json");
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run() -> Result<()> {
    init_tracing();

    // Determine config path
    let config_path = std::env::var("PERSONAFORGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(version = VERSION, "Configuration loaded successfully");
    info!("Provider backend: {}", config.provider.backend.as_str());
    info!(
        "Batch concurrency: {}, retry attempts: {}",
        config.pipeline.batch_concurrency, config.pipeline.retry.max_attempts
    );

    // Create provider client
    let credentials = create_credential_provider(&config.credentials);
    let client = GeminiClient::from_config(&config.provider, credentials.as_ref())
        .context("Failed to create provider client")?;
    if !client.has_credential() {
        // Requests fail with an authentication error until a key is set
        warn!(
            "No provider API key found (checked {:?} and [credentials].gemini_api_key)",
            config.credentials.api_key_env
        );
    }
    let providers = Providers::from_backend(Arc::new(client));

    let pipeline = GenerationPipeline::new(
        providers,
        config.models.clone(),
        config.pipeline.clone(),
    );
    info!("Generation pipeline initialized");

    // Relay run updates to WebSocket clients
    let ws_broadcaster = WsBroadcaster::default();
    let forwarder = spawn_forwarder(pipeline.clone(), ws_broadcaster.clone());
    info!("WebSocket broadcaster initialized");

    let state = Arc::new(AppState::new(config.clone(), pipeline, ws_broadcaster));

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

    // In-flight generation is abandoned; nothing is persisted
    info!("Server shutting down...");
    forwarder.abort();

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
