use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::persistence::PersistenceCounts;
use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when a configured store is unreachable.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// `Connected` or `Disconnected`.
    pub db_status: &'static str,
    pub pole_connected: bool,
    pub house_connected: bool,
    /// Number of registered dashboard connections.
    pub observers: usize,
    pub snapshots: PersistenceCounts,
}

/// GET /health -- hub liveness and durable-store connectivity.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match &state.pool {
        Some(pool) => gridx_db::health_check(pool).await.is_ok(),
        None => false,
    };

    let status = if state.pool.is_some() && !db_healthy {
        "degraded"
    } else {
        "ok"
    };

    let hub = state.hub.status().await;

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_status: if db_healthy { "Connected" } else { "Disconnected" },
        pole_connected: hub.pole_connected,
        house_connected: hub.house_connected,
        observers: hub.observers,
        snapshots: state.hub.persistence().counts(),
    })
}

/// Mount health check routes at `/` and `/health`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
}
