//! HTTP and WebSocket request handlers
//!
//! This module organizes all handlers into logical groups:
//! - `api` - Health check and active session listing
//! - `media_stream` - Telephony media-stream relay WebSocket
//! - `twiml` - Telephony voice webhook returning the stream-connect document

pub mod api;
pub mod media_stream;
pub mod twiml;

// Re-export commonly used handlers for convenient access
pub use media_stream::media_stream_handler;
