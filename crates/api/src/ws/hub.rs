use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use gridx_core::types::{ConnId, Timestamp};
use gridx_core::{DeviceRole, HubError, ReadingPayload, StateStore, SystemState};
use gridx_core::telemetry::parse_object;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

use crate::persistence::PersistenceGateway;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::Sender<Message>;
/// Receiving half handed to the connection's sender task.
pub type WsReceiver = mpsc::Receiver<Message>;

/// The only observer action the hub acts on.
pub const ACTION_SET_RELAY: &str = "set_relay";

/// Metadata for a single registered connection.
struct WsConnection {
    conn_id: ConnId,
    /// Channel sender for outbound messages to this connection.
    sender: WsSender,
    /// When this connection was established.
    connected_at: Timestamp,
}

impl WsConnection {
    fn new(conn_id: ConnId, sender: WsSender) -> Self {
        Self {
            conn_id,
            sender,
            connected_at: chrono::Utc::now(),
        }
    }
}

/// Everything the single-writer lock protects.
struct HubInner {
    store: StateStore,
    producers: HashMap<DeviceRole, WsConnection>,
    observers: HashMap<ConnId, WsConnection>,
}

/// Connectivity summary reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStatus {
    pub pole_connected: bool,
    pub house_connected: bool,
    pub observers: usize,
}

/// Routes producer readings into the shared state and fans it out.
///
/// One `tokio::sync::Mutex` guards the [`StateStore`] and the connection
/// registry together. Nothing inside the lock awaits I/O: every outbound
/// message is a `try_send` onto a bounded per-connection queue drained by
/// that connection's own sender task. This keeps each producer message
/// atomic (apply, alert recompute, snapshot, broadcast) and keeps every
/// observer's queue in hub issue order.
pub struct ConnectionHub {
    inner: Mutex<HubInner>,
    persistence: PersistenceGateway,
    queue_capacity: usize,
}

impl ConnectionHub {
    /// Create a hub whose per-connection outbound queues hold
    /// `queue_capacity` messages.
    pub fn new(persistence: PersistenceGateway, queue_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HubInner {
                store: StateStore::new(),
                producers: HashMap::new(),
                observers: HashMap::new(),
            }),
            persistence,
            queue_capacity: queue_capacity.max(1),
        }
    }

    // -----------------------------------------------------------------------
    // Producers
    // -----------------------------------------------------------------------

    /// Register `conn_id` as the producer for `role` and broadcast.
    ///
    /// A previous connection for the same role is sent a Close frame and
    /// deregistered first; from then on it gets no routed messages and its
    /// own traffic is rejected with [`HubError::Superseded`].
    pub async fn accept_producer(&self, role: DeviceRole, conn_id: ConnId) -> WsReceiver {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let mut inner = self.inner.lock().await;

        if let Some(old) = inner.producers.insert(role, WsConnection::new(conn_id, tx)) {
            tracing::info!(
                role = %role,
                old_conn_id = %old.conn_id,
                new_conn_id = %conn_id,
                held_since = %old.connected_at,
                "Producer takeover, closing previous connection"
            );
            let _ = old.sender.try_send(Message::Close(None));
        }

        inner.store.mark_connected(role, true);
        let state = inner.store.snapshot();
        Self::fan_out(&mut inner, &state);
        rx
    }

    /// Apply one producer message.
    ///
    /// Decodes the payload, merges it into the state, recomputes alerts,
    /// queues a snapshot for persistence and broadcasts the result, all
    /// under the hub lock.
    pub async fn on_producer_message(
        &self,
        role: DeviceRole,
        conn_id: ConnId,
        raw: &[u8],
    ) -> Result<(), HubError> {
        let payload = ReadingPayload::decode(role, raw)?;

        let mut inner = self.inner.lock().await;
        if !Self::holds_role(&inner, role, conn_id) {
            return Err(HubError::Superseded { role, conn_id });
        }

        inner.store.apply_reading(payload);
        inner.store.refresh_alerts();
        let state = inner.store.snapshot();

        self.persistence.record(role, &state);
        Self::fan_out(&mut inner, &state);
        Ok(())
    }

    /// Deregister the producer for `role` if `conn_id` still holds it.
    ///
    /// A superseded connection closing does not touch the role.
    pub async fn on_producer_disconnect(&self, role: DeviceRole, conn_id: ConnId) {
        let mut inner = self.inner.lock().await;
        if !Self::holds_role(&inner, role, conn_id) {
            tracing::debug!(role = %role, conn_id = %conn_id, "Superseded producer closed");
            return;
        }

        inner.producers.remove(&role);
        inner.store.mark_connected(role, false);
        let state = inner.store.snapshot();
        Self::fan_out(&mut inner, &state);
    }

    fn holds_role(inner: &HubInner, role: DeviceRole, conn_id: ConnId) -> bool {
        inner
            .producers
            .get(&role)
            .is_some_and(|conn| conn.conn_id == conn_id)
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    /// Register an observer. The current state is already queued on the
    /// returned receiver.
    pub async fn accept_observer(&self, conn_id: ConnId) -> WsReceiver {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let mut inner = self.inner.lock().await;

        if let Some(message) = encode_state(&inner.store.snapshot()) {
            let _ = tx.try_send(message);
        }
        inner.observers.insert(conn_id, WsConnection::new(conn_id, tx));
        rx
    }

    /// Handle a command from an observer.
    ///
    /// Commands must be JSON objects; only `action` is inspected.
    /// `set_relay` is forwarded verbatim to the house producer. Any other
    /// `action` value, of any JSON type, is an unknown action. Observers
    /// never get an acknowledgment; the error only tells the caller what
    /// happened.
    pub async fn on_observer_message(&self, conn_id: ConnId, raw: &str) -> Result<(), HubError> {
        let command = parse_object(raw.as_bytes())?;

        match command.get("action") {
            Some(Value::String(action)) if action == ACTION_SET_RELAY => {
                self.forward_to_house(conn_id, raw).await
            }
            Some(Value::String(action)) => Err(HubError::UnknownAction(Some(action.clone()))),
            None | Some(Value::Null) => Err(HubError::UnknownAction(None)),
            Some(other) => Err(HubError::UnknownAction(Some(other.to_string()))),
        }
    }

    async fn forward_to_house(&self, conn_id: ConnId, raw: &str) -> Result<(), HubError> {
        let inner = self.inner.lock().await;
        let house = inner
            .producers
            .get(&DeviceRole::House)
            .ok_or(HubError::ProducerUnavailable(DeviceRole::House))?;

        match house.sender.try_send(Message::Text(raw.into())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    conn_id = %conn_id,
                    house_conn_id = %house.conn_id,
                    "House outbound queue full, relay command dropped"
                );
                return Err(HubError::ProducerQueueFull(DeviceRole::House));
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(
                    conn_id = %conn_id,
                    house_conn_id = %house.conn_id,
                    "House connection closing, relay command dropped"
                );
                return Err(HubError::ProducerUnavailable(DeviceRole::House));
            }
        }

        tracing::debug!(conn_id = %conn_id, house_conn_id = %house.conn_id, "Relay command forwarded");
        Ok(())
    }

    /// Remove an observer. Unknown IDs are a no-op.
    pub async fn on_observer_disconnect(&self, conn_id: ConnId) {
        self.inner.lock().await.observers.remove(&conn_id);
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Broadcast the current state to every observer.
    ///
    /// Returns the number of observers the state was queued for.
    pub async fn broadcast(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let state = inner.store.snapshot();
        Self::fan_out(&mut inner, &state)
    }

    /// Queue `state` for every observer. An observer whose queue is full or
    /// closed is pruned; delivery to the rest continues.
    fn fan_out(inner: &mut HubInner, state: &SystemState) -> usize {
        let Some(message) = encode_state(state) else {
            return 0;
        };

        let mut failed = Vec::new();
        for (conn_id, conn) in &inner.observers {
            if let Err(e) = conn.sender.try_send(message.clone()) {
                failed.push((*conn_id, e.to_string()));
            }
        }

        for (conn_id, reason) in failed {
            inner.observers.remove(&conn_id);
            let error = HubError::BroadcastFailure { conn_id, reason };
            tracing::warn!(error = %error, "Pruned observer after failed broadcast");
        }

        inner.observers.len()
    }

    // -----------------------------------------------------------------------
    // Housekeeping
    // -----------------------------------------------------------------------

    /// Send a Ping frame to every registered connection.
    pub async fn ping_all(&self) {
        let inner = self.inner.lock().await;
        let conns = inner.producers.values().chain(inner.observers.values());
        for conn in conns {
            let _ = conn.sender.try_send(Message::Ping(Bytes::new()));
        }
    }

    /// Send a Close frame to every connection, then clear the registry and
    /// mark both roles disconnected.
    pub async fn shutdown_all(&self) {
        let mut inner = self.inner.lock().await;
        let count = inner.producers.len() + inner.observers.len();

        let conns = inner.producers.values().chain(inner.observers.values());
        for conn in conns {
            let _ = conn.sender.try_send(Message::Close(None));
        }

        inner.producers.clear();
        inner.observers.clear();
        for role in DeviceRole::ALL {
            inner.store.mark_connected(role, false);
        }
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Owned copy of the current state.
    pub async fn snapshot(&self) -> SystemState {
        self.inner.lock().await.store.snapshot()
    }

    pub async fn status(&self) -> HubStatus {
        let inner = self.inner.lock().await;
        HubStatus {
            pole_connected: inner.store.is_connected(DeviceRole::Pole),
            house_connected: inner.store.is_connected(DeviceRole::House),
            observers: inner.observers.len(),
        }
    }

    /// Connection currently registered for `role`, if any.
    pub async fn producer_conn_id(&self, role: DeviceRole) -> Option<ConnId> {
        self.inner
            .lock()
            .await
            .producers
            .get(&role)
            .map(|conn| conn.conn_id)
    }

    pub async fn observer_count(&self) -> usize {
        self.inner.lock().await.observers.len()
    }

    pub fn persistence(&self) -> &PersistenceGateway {
        &self.persistence
    }
}

/// Serialize the state into the text frame sent to observers.
fn encode_state(state: &SystemState) -> Option<Message> {
    match serde_json::to_string(state) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize system state");
            None
        }
    }
}
