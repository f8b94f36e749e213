use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::StreamExt;
use gridx_core::types::ConnId;
use gridx_core::{DeviceRole, HubError};

use crate::state::AppState;
use crate::ws::connection::{drive, forward_outbound};

/// GET /ws/hardware/{device_type} -- upgrade a meter connection.
///
/// `device_type` must be `pole` or `house`; anything else is rejected
/// before the upgrade.
pub async fn producer_ws_handler(
    ws: WebSocketUpgrade,
    Path(role): Path<DeviceRole>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_producer_socket(socket, role, state))
}

/// GET /ws/client -- upgrade a dashboard (observer) connection.
pub async fn observer_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_observer_socket(socket, state))
}

/// Manage a producer connection after upgrade.
///
/// Registers the role with the hub, spawns the outbound sender task, and
/// feeds every inbound frame through
/// [`ConnectionHub::on_producer_message`](crate::ws::hub::ConnectionHub::on_producer_message).
/// A malformed payload or a takeover by a newer connection ends the
/// session.
async fn handle_producer_socket(socket: WebSocket, role: DeviceRole, state: AppState) {
    let conn_id = ConnId::new_v4();
    let hub = Arc::clone(&state.hub);
    let send_timeout = state.config.send_timeout();
    tracing::info!(conn_id = %conn_id, role = %role, "Hardware connected");

    let rx = hub.accept_producer(role, conn_id).await;
    let (sink, mut stream) = socket.split();

    let send_task = tokio::spawn(forward_outbound(sink, rx, send_timeout, conn_id));

    let recv_hub = Arc::clone(&hub);
    let recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            let outcome = match result {
                Ok(Message::Text(text)) => {
                    recv_hub
                        .on_producer_message(role, conn_id, text.as_str().as_bytes())
                        .await
                }
                Ok(Message::Binary(bytes)) => {
                    recv_hub.on_producer_message(role, conn_id, &bytes).await
                }
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            };

            if let Err(e) = outcome {
                tracing::warn!(conn_id = %conn_id, role = %role, error = %e, "Closing producer");
                break;
            }
        }
    });

    drive(send_task, recv_task, send_timeout, async {
        hub.on_producer_disconnect(role, conn_id).await;
    })
    .await;

    tracing::info!(conn_id = %conn_id, role = %role, "Hardware disconnected");
}

/// Manage an observer connection after upgrade.
///
/// The hub queues the current state on registration, so the first frame
/// the observer sees is always a full snapshot.
async fn handle_observer_socket(socket: WebSocket, state: AppState) {
    let conn_id = ConnId::new_v4();
    let hub = Arc::clone(&state.hub);
    let send_timeout = state.config.send_timeout();
    tracing::info!(conn_id = %conn_id, "Frontend client connected");

    let rx = hub.accept_observer(conn_id).await;
    let (sink, mut stream) = socket.split();

    let send_task = tokio::spawn(forward_outbound(sink, rx, send_timeout, conn_id));

    let recv_hub = Arc::clone(&hub);
    let recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            let outcome = match result {
                Ok(Message::Text(text)) => recv_hub.on_observer_message(conn_id, text.as_str()).await,
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => recv_hub.on_observer_message(conn_id, text).await,
                    Err(e) => {
                        tracing::warn!(conn_id = %conn_id, error = %e, "Non-UTF-8 frame from client");
                        break;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            };

            match outcome {
                Ok(()) => {}
                Err(e) if e.is_terminal() => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Closing frontend client");
                    break;
                }
                Err(
                    e @ (HubError::UnknownAction(_)
                    | HubError::ProducerUnavailable(_)
                    | HubError::ProducerQueueFull(_)),
                ) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Client command ignored");
                }
                Err(e) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Client command failed");
                }
            }
        }
    });

    drive(send_task, recv_task, send_timeout, async {
        hub.on_observer_disconnect(conn_id).await;
    })
    .await;

    tracing::info!(conn_id = %conn_id, "Frontend client disconnected");
}
