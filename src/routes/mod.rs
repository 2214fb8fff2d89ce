pub mod api;
pub mod media_stream;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Path the telephony provider streams call audio to.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

/// Build the full application router: public HTTP routes plus the
/// connection-limited media-stream WebSocket.
pub fn create_app(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(media_stream::create_media_stream_router(state.clone()))
        .with_state(state)
}
