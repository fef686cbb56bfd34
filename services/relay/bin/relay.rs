//! Main Entrypoint for the Relay Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Binding the first available port at or above the configured one.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the server and handling graceful shutdown.

use anyhow::Context;
use callbridge_relay::{config::Config, net, router::create_router, state::AppState};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded.");

    if config.agent_credentials().is_none() {
        warn!(
            "ELEVENLABS_AGENT_ID and/or ELEVENLABS_API_KEY are not set; \
             every telephony connection will be rejected."
        );
    }

    // --- 3. Bind a Port ---
    let listener = net::bind_available_port(config.host, config.port, config.port_retry_limit)
        .await
        .context("Failed to bind a listening port")?;
    let addr = listener.local_addr()?;

    // --- 4. Create Router and Apply Middleware ---
    let app_state = Arc::new(AppState {
        config: Arc::new(config),
    });
    let app = create_router(app_state).layer(TraceLayer::new_for_http());

    // --- 5. Start Server ---
    info!(%addr, "Relay configured. Starting server...");
    info!("WebSocket endpoint: ws://{addr}/ws");
    info!("Health check: http://{addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down.");
    Ok(())
}
