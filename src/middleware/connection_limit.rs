//! Connection limit middleware for the media-stream WebSocket
//!
//! Enforces the global relay connection cap. The reserved slot travels with
//! the request as a [`RelaySlot`] extension and is released when the relay
//! session that owns it ends.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use callbridge::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/media-stream", get(media_stream_handler))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError};

/// Middleware that enforces the relay connection limit.
///
/// Only WebSocket upgrade requests (detected by the Upgrade header) are
/// counted. Everything else passes through so the upgrade extractor can
/// reject it. Returns 503 Service Unavailable when the limit is reached.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    match state.try_acquire_relay_slot() {
        Ok(slot) => {
            request.extensions_mut().insert(slot);
            next.run(request).await
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(
                active = state.active_relay_connections(),
                "Rejecting media stream connection: global limit reached"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
    }
}
