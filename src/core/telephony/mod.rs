//! Telephony media-stream protocol.
//!
//! The telephony provider connects to the relay path and streams JSON events
//! discriminated by an `event` field. Audio is base64 G.711 u-law at 8kHz.

mod messages;

pub use messages::{
    MediaPayload, OutboundMedia, StartPayload, TelephonyEvent, TelephonyOutbound,
};
