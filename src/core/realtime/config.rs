//! Realtime endpoint configuration types.
//!
//! This module contains the settings a relay session needs to dial and
//! configure the conversational-AI realtime endpoint:
//! - Endpoint URL and model
//! - Voice selection
//! - Audio format (telephony audio is always G.711 u-law)
//! - The settle delay applied before the first configuration send

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::messages::{SessionConfig, TurnDetection};

/// Realtime API WebSocket endpoint.
pub const REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model requested when none is configured.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Pause between activation and the first `session.update`, letting the
/// upstream session settle.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 250;

/// How long the upstream WebSocket handshake may take.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Config-store key holding the upstream bearer credential.
pub const DEFAULT_API_KEY_CONFIG_KEY: &str = "openai_api_key";

// =============================================================================
// Voices
// =============================================================================

/// Available voices for the realtime endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeVoice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl RealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse a voice name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Get all available voices.
    pub fn all() -> &'static [RealtimeVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Coral,
            Self::Echo,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }
}

impl std::fmt::Display for RealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio formats understood by the realtime endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RealtimeAudioFormat {
    /// PCM 16-bit signed little-endian, 24kHz
    #[serde(rename = "pcm16")]
    Pcm16,
    /// G.711 u-law, 8kHz. What telephony media streams carry.
    #[default]
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 a-law, 8kHz
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

impl RealtimeAudioFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Pcm16 => 24000,
            Self::G711Ulaw | Self::G711Alaw => 8000,
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Everything a relay session needs to know about the realtime endpoint.
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    /// WebSocket endpoint without query string
    pub url: String,
    pub model: String,
    pub voice: RealtimeVoice,
    pub temperature: f32,
    pub settle_delay: Duration,
    /// Upper bound on the upstream dial
    pub connect_timeout: Duration,
    /// Key looked up in the config store for the bearer credential
    pub api_key_config_key: String,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: RealtimeVoice::default(),
            temperature: DEFAULT_TEMPERATURE,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            api_key_config_key: DEFAULT_API_KEY_CONFIG_KEY.to_string(),
        }
    }
}

impl RealtimeSettings {
    /// Build the WebSocket URL with the model parameter.
    pub fn endpoint(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}model={}", self.url, separator, self.model)
    }

    /// The `session.update` payload for a call whose script is `instructions`.
    pub fn session_config(&self, instructions: String) -> SessionConfig {
        let audio_format = RealtimeAudioFormat::G711Ulaw.as_str().to_string();
        SessionConfig {
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: None,
                prefix_padding_ms: None,
                silence_duration_ms: None,
            }),
            input_audio_format: Some(audio_format.clone()),
            output_audio_format: Some(audio_format),
            voice: Some(self.voice.as_str().to_string()),
            instructions: Some(instructions),
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            temperature: Some(self.temperature),
        }
    }
}
