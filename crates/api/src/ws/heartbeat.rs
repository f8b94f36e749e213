use std::sync::Arc;
use std::time::Duration;

use crate::ws::hub::ConnectionHub;

/// Spawn a background task that sends periodic Ping frames to every
/// registered producer and observer.
///
/// A peer that stops reading eventually trips the per-send timeout in its
/// sender task and is disconnected. The returned `JoinHandle` is aborted
/// during shutdown.
pub fn start_heartbeat(hub: Arc<ConnectionHub>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let status = hub.status().await;
            tracing::debug!(
                observers = status.observers,
                pole = status.pole_connected,
                house = status.house_connected,
                "WebSocket heartbeat ping"
            );
            hub.ping_all().await;
        }
    })
}
