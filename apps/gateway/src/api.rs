//! # Operator HTTP API
//!
//! ```text
//! POST /api/save       FullStateSnapshot → 200 {"status":"ok"}
//!                                          400 bad body / validation
//!                                          409 duplicate or stale id
//!                                          500 storage failure
//! GET  /api/snapshot   → FullStateSnapshot (current store state)
//! GET  /health         → {"status", "database", "transport", "announcer"}
//! ```

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use roslinki_core::FullStateSnapshot;
use roslinki_db::Database;
use roslinki_sync::{SyncCoordinator, Transport};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub coordinator: SyncCoordinator,
    pub transport: Arc<dyn Transport>,
}

/// Builds the operator router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/save", post(save_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Replaces the full config and device set.
async fn save_handler(
    State(state): State<AppState>,
    body: Result<Json<FullStateSnapshot>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(snapshot) = body?;

    let outcome = state.coordinator.submit(&snapshot).await?;
    info!(
        devices = snapshot.devices.len(),
        inserted = outcome.inserted.len(),
        deleted = outcome.deleted,
        "Operator save applied"
    );

    Ok(Json(json!({ "status": "ok" })))
}

async fn snapshot_handler(
    State(state): State<AppState>,
) -> Result<Json<FullStateSnapshot>, ApiError> {
    Ok(Json(state.db.config_store().read_snapshot().await?))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let database = state.db.health_check().await;
    let transport = state.transport.state().await;
    let announcer = state.coordinator.state().await;
    let status = if database { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "database": database,
        "transport": transport.to_string(),
        "announcer": announcer.to_string(),
    }))
}
