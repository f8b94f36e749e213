//! gridx telemetry hub server library.
//!
//! Exposes the building blocks (config, state, routes, WebSocket hub,
//! snapshot persistence) so integration tests and the binary entrypoint
//! can both access them.

pub mod config;
pub mod persistence;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
