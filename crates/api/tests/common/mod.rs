#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use gridx_core::HubError;
use gridx_db::models::snapshot::CreateSnapshot;

use gridx_api::config::ServerConfig;
use gridx_api::persistence::{PersistenceGateway, SnapshotWriter};
use gridx_api::router::build_app_router;
use gridx_api::state::AppState;
use gridx_api::ws::hub::WsReceiver;
use gridx_api::ws::ConnectionHub;

/// Build a test `ServerConfig`: loopback host, ephemeral port, short send
/// timeout, dev CORS origin.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        send_timeout_ms: 1_000,
        ..ServerConfig::default()
    }
}

/// Hub with persistence disabled.
pub fn hub() -> Arc<ConnectionHub> {
    Arc::new(ConnectionHub::new(PersistenceGateway::disabled(), 16))
}

/// Build the full application router around `hub`, with no database.
pub fn build_test_app(hub: Arc<ConnectionHub>) -> Router {
    let config = test_config();
    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        hub,
    };
    build_app_router(state, &config)
}

/// Serve the application on an ephemeral loopback port.
pub async fn spawn_server(hub: Arc<ConnectionHub>) -> SocketAddr {
    let app = build_test_app(hub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Send a GET request through the router without binding a socket.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Receive the next queued message, failing the test after one second.
pub async fn next_message(rx: &mut WsReceiver) -> Message {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("channel closed")
}

/// Receive the next queued state broadcast as JSON.
pub async fn next_state(rx: &mut WsReceiver) -> serde_json::Value {
    match next_message(rx).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected state text frame, got {other:?}"),
    }
}

/// Snapshot writer that keeps every row in memory.
#[derive(Default)]
pub struct RecordingWriter {
    rows: Mutex<Vec<CreateSnapshot>>,
}

impl RecordingWriter {
    pub fn rows(&self) -> Vec<CreateSnapshot> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotWriter for RecordingWriter {
    async fn write(&self, snapshot: &CreateSnapshot) -> Result<(), HubError> {
        self.rows.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

/// Snapshot writer whose store is always down.
pub struct FailingWriter;

#[async_trait]
impl SnapshotWriter for FailingWriter {
    async fn write(&self, _snapshot: &CreateSnapshot) -> Result<(), HubError> {
        Err(HubError::PersistenceFailure("connection refused".to_string()))
    }
}
