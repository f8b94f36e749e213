//! WebSocket infrastructure for meters and dashboards.
//!
//! [`ConnectionHub`] owns the shared system state and the connection
//! registry; [`handler`] holds the Axum upgrade handlers for the producer
//! and observer endpoints.

mod connection;
pub mod handler;
mod heartbeat;
pub mod hub;

pub use handler::{observer_ws_handler, producer_ws_handler};
pub use heartbeat::start_heartbeat;
pub use hub::{ConnectionHub, HubStatus};
