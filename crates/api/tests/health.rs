//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use gridx_core::types::ConnId;
use gridx_core::DeviceRole;
use tower::ServiceExt;

use common::{body_json, get};

// ---------------------------------------------------------------------------
// Test: GET /health without a store reports ok and a disconnected database
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_without_store_is_ok() {
    let app = common::build_test_app(common::hub());
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["db_status"], "Disconnected");
    assert_eq!(json["pole_connected"], false);
    assert_eq!(json["observers"], 0);
    assert_eq!(json["snapshots"]["written"], 0);
}

// ---------------------------------------------------------------------------
// Test: GET / serves the same liveness payload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn root_serves_health_payload() {
    let app = common::build_test_app(common::hub());
    let response = get(app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["db_status"], "Disconnected");
}

// ---------------------------------------------------------------------------
// Test: health reflects live connections in the hub
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_hub_connections() {
    let hub = common::hub();
    let _house = hub.accept_producer(DeviceRole::House, ConnId::new_v4()).await;
    let _observer = hub.accept_observer(ConnId::new_v4()).await;

    let json = body_json(get(common::build_test_app(hub), "/health").await).await;

    assert_eq!(json["house_connected"], true);
    assert_eq!(json["pole_connected"], false);
    assert_eq!(json["observers"], 1);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = common::build_test_app(common::hub());
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = common::build_test_app(common::hub());
    let response = get(app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

// ---------------------------------------------------------------------------
// Test: CORS preflight OPTIONS request returns correct headers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_returns_correct_headers() {
    let app = common::build_test_app(common::hub());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/ws/client")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    let allow_origin = headers
        .get("access-control-allow-origin")
        .expect("Missing Access-Control-Allow-Origin header")
        .to_str()
        .unwrap();
    assert_eq!(allow_origin, "http://localhost:5173");

    let allow_methods = headers
        .get("access-control-allow-methods")
        .expect("Missing Access-Control-Allow-Methods header")
        .to_str()
        .unwrap();
    assert!(
        allow_methods.contains("GET"),
        "Allow-Methods should contain GET, got: {allow_methods}"
    );
}
