use crate::device::DeviceRole;
use crate::types::ConnId;

/// Failures raised while handling hub traffic.
///
/// None of these are fatal to the process. Each variant carries its own
/// handling policy; see the connection handlers in the API crate.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A producer or observer sent data that could not be decoded.
    /// The offending connection is terminated.
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// An observer command with a missing or unrecognized `action`.
    /// Ignored silently.
    #[error("Unknown action: {0:?}")]
    UnknownAction(Option<String>),

    /// A relay command arrived while no house producer is registered.
    /// Dropped silently.
    #[error("Producer unavailable: {0}")]
    ProducerUnavailable(DeviceRole),

    /// A relay command arrived while the house producer's outbound queue
    /// is full. Dropped and logged as backpressure.
    #[error("Producer {0} outbound queue full")]
    ProducerQueueFull(DeviceRole),

    /// The durable store rejected a snapshot write. Logged and discarded.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// An observer could not accept a broadcast. The observer is pruned.
    #[error("Broadcast to {conn_id} failed: {reason}")]
    BroadcastFailure { conn_id: ConnId, reason: String },

    /// A producer connection whose role was taken over by a newer one.
    #[error("Connection {conn_id} no longer holds role {role}")]
    Superseded { role: DeviceRole, conn_id: ConnId },

    /// A producer path named a role other than `pole` or `house`.
    #[error("Unknown device role: {0}")]
    UnknownRole(String),
}

impl HubError {
    /// Whether the connection that triggered this error must be closed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HubError::MalformedPayload(_) | HubError::Superseded { .. }
        )
    }
}
