//! Per-connection plumbing shared by producer and observer sockets.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use gridx_core::types::ConnId;
use tokio::task::JoinHandle;

use crate::ws::hub::WsReceiver;

/// Forward queued messages to the socket until the queue closes.
///
/// Every send is bounded by `send_timeout`; a timeout or sink error ends
/// the task, which the caller treats as a disconnect.
pub async fn forward_outbound<S>(
    mut sink: S,
    mut rx: WsReceiver,
    send_timeout: Duration,
    conn_id: ConnId,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));

        match tokio::time::timeout(send_timeout, sink.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket sink closed");
                return;
            }
            Err(_) => {
                tracing::warn!(
                    conn_id = %conn_id,
                    timeout_ms = send_timeout.as_millis() as u64,
                    "WebSocket send timed out, dropping connection"
                );
                return;
            }
        }

        if closing {
            return;
        }
    }

    // Hub dropped our sender: deregistered or pruned.
    let _ = tokio::time::timeout(send_timeout, sink.close()).await;
}

/// Run both halves of a connection until one finishes, then tear down.
///
/// If the receive half ends first, `deregister` runs before the sender is
/// given `grace` to flush and close the socket. If the sender ends first
/// (timeout or broken sink), the receiver is aborted.
pub async fn drive<D>(
    mut send_task: JoinHandle<()>,
    mut recv_task: JoinHandle<()>,
    grace: Duration,
    deregister: D,
) where
    D: Future<Output = ()>,
{
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            deregister.await;
        }
        _ = &mut recv_task => {
            deregister.await;
            if tokio::time::timeout(grace, &mut send_task).await.is_err() {
                send_task.abort();
            }
        }
    }
}
