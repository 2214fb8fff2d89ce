//! Upstream conversational-AI realtime endpoint.
//!
//! One [`UpstreamConnection`] is opened per relay session. It speaks the
//! realtime WebSocket protocol: JSON events tagged by a `type` field, with
//! audio carried as base64 G.711 u-law.
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge::core::realtime::{ClientEvent, RealtimeSettings, UpstreamConnection};
//! use std::sync::Arc;
//!
//! let settings = RealtimeSettings::default();
//! let upstream = UpstreamConnection::connect(
//!     &settings.endpoint(),
//!     &api_key,
//!     settings.connect_timeout,
//!     cancel.clone(),
//!     Arc::new(|event| Box::pin(async move {
//!         println!("{}", event.kind());
//!     })),
//! ).await?;
//!
//! upstream.send(ClientEvent::audio_append("AAAA")).await?;
//! ```

mod config;
mod connector;
mod messages;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

pub use config::{
    DEFAULT_API_KEY_CONFIG_KEY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REALTIME_MODEL, DEFAULT_SETTLE_DELAY_MS,
    DEFAULT_TEMPERATURE, REALTIME_URL, RealtimeAudioFormat, RealtimeSettings, RealtimeVoice,
};
pub use connector::UpstreamConnection;
pub use messages::{
    ApiError, ClientEvent, RateLimit, ResponseInfo, ServerEvent, SessionConfig, SessionInfo,
    TurnDetection,
};

/// Errors raised by the upstream connection.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Dial or handshake failure
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Endpoint URL or credential could not form a valid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The handshake did not complete in time
    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// The session ended while the dial was in flight
    #[error("Connection cancelled")]
    Cancelled,

    /// The connection is closed or was never opened
    #[error("Not connected")]
    NotConnected,

    /// The outbound queue rejected the event
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Callback invoked for every parsed server event, in arrival order.
pub type ServerEventCallback =
    Arc<dyn Fn(ServerEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
