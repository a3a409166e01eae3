//! # Roslinki Gateway
//!
//! Irrigation gateway process.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gateway Startup                                  │
//! │                                                                         │
//! │  1. tracing (RUST_LOG, default info,roslinki=debug)                     │
//! │  2. GatewayConfig::load (TOML + env overrides)                          │
//! │  3. Database::new (WAL pool + migrations)                               │
//! │  4. MqttTransport + event loop task (subscribe on every ConnAck)        │
//! │  5. SyncCoordinator + announce worker task                              │
//! │  6. axum on http.bind_addr:http.port until Ctrl+C / SIGTERM             │
//! │  7. stop worker, disconnect broker, close pool                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use roslinki_db::{Database, DbConfig};
use roslinki_gateway::{router, AppState};
use roslinki_sync::{
    Broadcaster, GatewayConfig, InboundHandler, MqttTransport, SyncCoordinator, Topics, Transport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,roslinki=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting Roslinki gateway...");

    // Configuration
    let config = GatewayConfig::load(None).context("Failed to load configuration")?;
    info!(
        http = %config.http.bind_address(),
        broker = %config.mqtt.broker_url,
        client_id = %config.mqtt.client_id,
        prefix = %config.mqtt.topic_prefix,
        interval = ?config.broadcast.interval(),
        "Configuration loaded"
    );

    // Store
    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }
    let db_config = DbConfig::new(config.database.path.clone())
        .max_connections(config.database.max_connections);
    let db = Database::new(db_config)
        .await
        .context("Failed to open database")?;

    // Broker link
    let topics = Topics::new(&config.mqtt.topic_prefix);
    let inbound = InboundHandler::new(db.clone(), topics.clone());
    let (mqtt, event_loop) =
        MqttTransport::new(&config.mqtt, inbound).context("Failed to configure MQTT client")?;
    let mqtt_task = tokio::spawn(event_loop.run());
    let transport: Arc<dyn Transport> = Arc::new(mqtt.clone());

    // Save → announce
    let broadcaster = Broadcaster::new(
        db.config_store(),
        transport.clone(),
        topics.config.clone(),
        config.mqtt.publish_timeout(),
    );
    let (coordinator, worker, coordinator_handle) =
        SyncCoordinator::new(db.clone(), broadcaster, config.broadcast.interval());
    let worker_task = tokio::spawn(worker.run());

    // HTTP
    let app = router(AppState {
        db: db.clone(),
        coordinator,
        transport,
    });
    let bind_addr = config.http.bind_address();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!(addr = %bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Teardown
    if let Err(e) = coordinator_handle.shutdown().await {
        warn!(error = %e, "Announce worker already stopped");
    }
    if let Err(e) = worker_task.await {
        error!(error = %e, "Announce worker panicked");
    }

    if let Err(e) = mqtt.shutdown().await {
        warn!(error = %e, "MQTT event loop already stopped");
    }
    if let Err(e) = mqtt_task.await {
        error!(error = %e, "MQTT event loop panicked");
    }

    db.close().await;

    info!("Gateway shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
