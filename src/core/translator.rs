//! Frame translation between the telephony media stream and the realtime
//! endpoint.
//!
//! Both directions are pure functions over parsed events. Deciding what to do
//! with the result (session state, sockets, stores) is left to the relay.

use base64::prelude::*;
use thiserror::Error;

use crate::core::realtime::{ClientEvent, ServerEvent};
use crate::core::telephony::{TelephonyEvent, TelephonyOutbound};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Malformed telephony frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
}

/// What the relay should do with one telephony frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundAction {
    /// The stream has started; identifiers for activation
    Start { stream_sid: String, call_sid: String },
    /// Caller audio ready for the realtime endpoint
    ForwardAudio(ClientEvent),
    /// The telephony leg is ending
    Stop,
    Ignore,
}

/// What the relay should do with one realtime server event.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamAction {
    AppendTranscript(String),
    SendToTelephony(TelephonyOutbound),
    FlushTranscript,
    Ignore,
}

/// Parse and translate a telephony text frame.
pub fn translate_telephony(text: &str) -> Result<InboundAction, TranslateError> {
    let event: TelephonyEvent = serde_json::from_str(text)?;

    let action = match event {
        TelephonyEvent::Start { start } => InboundAction::Start {
            stream_sid: start.stream_sid,
            call_sid: start.call_sid,
        },
        TelephonyEvent::Media { media } => {
            InboundAction::ForwardAudio(ClientEvent::audio_append(media.payload))
        }
        TelephonyEvent::Stop {} => InboundAction::Stop,
        other => {
            tracing::debug!(event = other.kind(), "Ignoring telephony event");
            InboundAction::Ignore
        }
    };
    Ok(action)
}

/// Translate a realtime server event.
///
/// Audio is dropped when it is empty, when `stream_sid` is unknown, or when the
/// payload is not valid base64.
pub fn translate_upstream(event: ServerEvent, stream_sid: Option<&str>) -> UpstreamAction {
    match event {
        ServerEvent::ContentDelta { delta } | ServerEvent::AudioTranscriptDelta { delta } => {
            if delta.is_empty() {
                UpstreamAction::Ignore
            } else {
                UpstreamAction::AppendTranscript(delta)
            }
        }
        ServerEvent::AudioDelta { delta, .. } => {
            if delta.is_empty() {
                return UpstreamAction::Ignore;
            }
            let Some(stream_sid) = stream_sid else {
                tracing::debug!("Dropping upstream audio before stream start");
                return UpstreamAction::Ignore;
            };
            match BASE64_STANDARD.decode(delta.as_bytes()) {
                Ok(audio) => UpstreamAction::SendToTelephony(TelephonyOutbound::media(
                    stream_sid,
                    BASE64_STANDARD.encode(audio),
                )),
                Err(e) => {
                    tracing::warn!("Dropping upstream audio with invalid base64: {}", e);
                    UpstreamAction::Ignore
                }
            }
        }
        ServerEvent::ResponseDone { ref response } => {
            tracing::info!(
                event = event.kind(),
                response_id = response.as_ref().map(|r| r.id.as_str()),
                "Realtime event"
            );
            UpstreamAction::FlushTranscript
        }
        ServerEvent::Error { error } => {
            match error {
                Some(error) => tracing::warn!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    "Realtime endpoint reported an error: {}",
                    error.message
                ),
                None => tracing::warn!("Realtime endpoint reported an error"),
            }
            UpstreamAction::Ignore
        }
        ServerEvent::SessionCreated { ref session } => {
            tracing::info!(
                event = event.kind(),
                upstream_session = session.as_ref().map(|s| s.id.as_str()),
                "Realtime event"
            );
            UpstreamAction::Ignore
        }
        ServerEvent::ContentDone {}
        | ServerEvent::RateLimitsUpdated { .. }
        | ServerEvent::InputAudioBufferCommitted { .. }
        | ServerEvent::SpeechStarted { .. }
        | ServerEvent::SpeechStopped { .. } => {
            tracing::info!(event = event.kind(), "Realtime event");
            UpstreamAction::Ignore
        }
        ServerEvent::Unknown => UpstreamAction::Ignore,
    }
}

/// Conversation instructions for calling `name` with an agent's `prompt`.
pub fn build_instructions(prompt: &str, name: &str) -> String {
    format!(
        "{prompt}\nYou are calling {name}. Start the conversation by asking if {name} is available."
    )
}
