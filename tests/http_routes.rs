//! HTTP Route Tests
//!
//! Exercises the assembled router in-process through `tower::ServiceExt`.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use tower::util::ServiceExt;

use callbridge::store::{MemoryStore, Stores};
use callbridge::{AppState, ServerConfig, routes};

fn app_with(config: ServerConfig) -> (Arc<AppState>, Router) {
    let state = AppState::with_stores(config, Stores::from_backend(Arc::new(MemoryStore::new())));
    (state.clone(), routes::create_app(state))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (_, app) = app_with(ServerConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, serde_json::json!({"status": "OK"}));
}

#[tokio::test]
async fn test_sessions_listing() {
    let (state, app) = app_with(ServerConfig::default());
    let session = state.sessions.create();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["active_connections"], 0);
    assert_eq!(body["sessions"][0]["session_id"], session.id().to_string());
    assert_eq!(body["sessions"][0]["state"], "connecting");
}

#[tokio::test]
async fn test_outbound_call_handler_uses_host_header() {
    let (_, app) = app_with(ServerConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/call-log/outbound-call-handler")
                .header(header::HOST, "abc.ngrok.app")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/xml"
    );
    let body = body_string(response).await;
    assert!(body.contains(r#"<Stream url="wss://abc.ngrok.app/media-stream" />"#));
}

#[tokio::test]
async fn test_outbound_call_handler_prefers_public_host() {
    let mut config = ServerConfig::default();
    config.public_host = Some("relay.example.com".to_string());
    let (_, app) = app_with(config);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/call-log/outbound-call-handler")
                .header(header::HOST, "internal:3001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_string(response).await;
    assert!(body.contains("wss://relay.example.com/media-stream"));
    assert!(!body.contains("internal"));
}

#[tokio::test]
async fn test_outbound_call_handler_without_host() {
    let (_, app) = app_with(ServerConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/call-log/outbound-call-handler")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_media_stream_requires_upgrade() {
    let (state, app) = app_with(ServerConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri(routes::MEDIA_STREAM_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(state.active_relay_connections(), 0);
    assert!(state.sessions.is_empty());
}
