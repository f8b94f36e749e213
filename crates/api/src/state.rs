use std::sync::Arc;

use crate::config::ServerConfig;
use crate::ws::ConnectionHub;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool; `None` when persistence is disabled or the
    /// store was unreachable at startup.
    pub pool: Option<gridx_db::DbPool>,
    pub config: Arc<ServerConfig>,
    /// Owner of the system state and every meter/dashboard connection.
    pub hub: Arc<ConnectionHub>,
}
