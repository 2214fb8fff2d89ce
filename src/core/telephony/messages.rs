use serde::{Deserialize, Serialize};

/// Events received on the relay socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    /// Socket handshake acknowledgement
    Connected {},

    /// Stream metadata, sent once before any media
    Start { start: StartPayload },

    /// One audio frame
    Media { media: MediaPayload },

    /// The call's media stream has ended
    Stop {},

    /// Playback marker acknowledgement
    Mark {},

    /// Keypad digit
    Dtmf {},

    #[serde(other)]
    Unknown,
}

impl TelephonyEvent {
    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected {} => "connected",
            Self::Start { .. } => "start",
            Self::Media { .. } => "media",
            Self::Stop {} => "stop",
            Self::Mark {} => "mark",
            Self::Dtmf {} => "dtmf",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub stream_sid: String,
    pub call_sid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Base64 u-law audio
    pub payload: String,
}

/// Events written to the relay socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyOutbound {
    Media(OutboundMedia),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMedia {
    pub stream_sid: String,
    pub media: MediaPayload,
}

impl TelephonyOutbound {
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        TelephonyOutbound::Media(OutboundMedia {
            stream_sid: stream_sid.into(),
            media: MediaPayload {
                payload: payload.into(),
            },
        })
    }
}
