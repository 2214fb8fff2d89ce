use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, twiml};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/sessions", get(api::list_sessions))
        // Outbound-call webhook answered with TwiML pointing at the media stream
        .route(
            "/call-log/outbound-call-handler",
            post(twiml::outbound_call_handler),
        )
        .layer(TraceLayer::new_for_http())
}
