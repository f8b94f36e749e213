pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the WebSocket route tree.
///
/// ```text
/// /ws/hardware/{device_type}     meter connection (pole | house)
/// /ws/client                     dashboard connection
/// ```
pub fn ws_routes() -> Router<AppState> {
    Router::new()
        .route("/ws/hardware/{device_type}", get(ws::producer_ws_handler))
        .route("/ws/client", get(ws::observer_ws_handler))
}
