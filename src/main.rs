//! chat-relay server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use chat_relay::api;
use chat_relay::app_state::AppState;
use chat_relay::auth::{IdentityResolver, MemoryDirectory, TokenVerifier};
use chat_relay::config::{LogFormat, RelayConfig};
use chat_relay::persistence::{MemoryStore, MessageStore, PostgresStore};
use chat_relay::ws::Hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting chat-relay");

    // Build collaborators
    let (store, identities): (Arc<dyn MessageStore>, Arc<dyn IdentityResolver>) =
        if config.persistence_enabled {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(config.database_min_connections)
                .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
                .connect(&config.database_url)
                .await
                .context("failed to connect to PostgreSQL")?;
            let postgres = Arc::new(PostgresStore::new(pool));
            postgres.migrate().await?;
            tracing::info!("persistence enabled (PostgreSQL)");
            (
                Arc::clone(&postgres) as Arc<dyn MessageStore>,
                postgres as Arc<dyn IdentityResolver>,
            )
        } else {
            tracing::warn!("persistence disabled, messages are kept in memory only");
            (
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryDirectory::auto_enrolling()),
            )
        };

    // Start the hub
    let (hub, hub_task) = Hub::spawn(config.backpressure_policy);

    // Build application state
    let app_state = AppState::new(
        hub.clone(),
        store,
        identities,
        TokenVerifier::new(&config.jwt_secret),
        config.connection_settings(),
    );

    // Build router
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Upgraded sockets outlive the HTTP server and each holds a HubHandle,
    // so the hub is stopped explicitly; that closes every outbound queue.
    if let Err(err) = hub.shutdown() {
        tracing::warn!(error = %err, "hub already stopped");
    }
    if let Err(err) = hub_task.await {
        tracing::warn!(error = %err, "hub task ended abnormally");
    }
    tracing::info!("chat-relay stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
