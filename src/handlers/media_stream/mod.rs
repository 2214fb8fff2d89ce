//! Telephony media-stream relay WebSocket
//!
//! Each connection on the relay path becomes one session: the handler dials
//! the realtime endpoint, pumps frames in both directions, and tears both legs
//! down when either one goes away.
//!
//! # Protocol
//!
//! ## Telephony → Server
//!
//! - **connected**: handshake acknowledgement (ignored)
//! - **start**: `{start: {streamSid, callSid}}`; configures the conversation
//! - **media**: `{media: {payload}}`; base64 u-law caller audio
//! - **stop**: the call's media stream has ended
//!
//! ## Server → Telephony
//!
//! - **media**: `{event: "media", streamSid, media: {payload}}`; assistant audio
//!
//! No error frames are sent. The telephony side only observes the socket
//! closing.

mod handler;

pub use handler::media_stream_handler;
