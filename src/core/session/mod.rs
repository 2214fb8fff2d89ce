//! Per-call relay sessions.
//!
//! A [`Session`] pairs one telephony relay connection with one upstream
//! realtime connection. All mutable per-call fields sit behind a single
//! mutex that is never held across an await point.
//!
//! # State machine
//!
//! ```text
//! Connecting -> ConfiguredAwaitingStart -> Active
//!      \                  |                  /
//!       +-------------> Closing <-----------+
//!                          |
//!                        Closed
//! ```

mod registry;
mod relay;
mod transcript;

use std::fmt;
use std::sync::OnceLock;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::realtime::{UpstreamConnection, UpstreamError};
use crate::store::StoreError;

pub use registry::SessionRegistry;
pub use relay::{RelayContext, RelayFlow};
pub use transcript::{TranscriptBuffer, flush_transcript};

/// Errors that end or reject a relay session step.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    #[error("No realtime API credential configured")]
    MissingCredential,

    #[error("No call record found for call {0}")]
    CallRecordNotFound(String),

    #[error("Call record {0} has no agent assigned")]
    NoAgentAssigned(i64),

    #[error("Agent {0} not found")]
    AgentNotFound(i64),

    #[error("Upstream already attached to session")]
    UpstreamAlreadyAttached,

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Opaque session identifier, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    ConfiguredAwaitingStart,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Connecting, ConfiguredAwaitingStart) => true,
            (ConfiguredAwaitingStart, Active) => true,
            (Closing, Closed) => true,
            (Closed, _) => false,
            (_, Closing) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::ConfiguredAwaitingStart => "configured_awaiting_start",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    stream_sid: Option<String>,
    call_sid: Option<String>,
    call_record_id: Option<i64>,
    transcript: TranscriptBuffer,
}

/// Point-in-time view of a session, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub state: SessionState,
    pub stream_sid: Option<String>,
    pub call_sid: Option<String>,
}

/// State of one relayed call.
pub struct Session {
    id: SessionId,
    inner: Mutex<SessionInner>,
    /// Cancelled when either leg goes away
    cancel: CancellationToken,
    upstream: OnceLock<UpstreamConnection>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            inner: Mutex::new(SessionInner {
                state: SessionState::Connecting,
                stream_sid: None,
                call_sid: None,
                call_record_id: None,
                transcript: TranscriptBuffer::default(),
            }),
            cancel: CancellationToken::new(),
            upstream: OnceLock::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Move to `next`, returning the previous state.
    ///
    /// Disallowed transitions leave the state unchanged.
    pub fn transition(&self, next: SessionState) -> Result<SessionState, RelayError> {
        let mut inner = self.inner.lock();
        let from = inner.state;
        if !from.can_transition_to(next) {
            return Err(RelayError::InvalidTransition { from, to: next });
        }
        inner.state = next;
        Ok(from)
    }

    /// Enter `Closing` unless already closing or closed. Returns whether this
    /// call changed the state.
    pub fn begin_closing(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Closing | SessionState::Closed => false,
            _ => {
                inner.state = SessionState::Closing;
                true
            }
        }
    }

    /// Record the identifiers carried by the first `start` event.
    ///
    /// Returns `false` (and changes nothing) when the session is not awaiting
    /// a start or already has a call identifier.
    pub fn accept_start(&self, stream_sid: &str, call_sid: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::ConfiguredAwaitingStart || inner.call_sid.is_some() {
            return false;
        }
        inner.stream_sid = Some(stream_sid.to_string());
        inner.call_sid = Some(call_sid.to_string());
        true
    }

    pub fn stream_sid(&self) -> Option<String> {
        self.inner.lock().stream_sid.clone()
    }

    pub fn call_sid(&self) -> Option<String> {
        self.inner.lock().call_sid.clone()
    }

    pub fn call_record_id(&self) -> Option<i64> {
        self.inner.lock().call_record_id
    }

    pub(crate) fn set_call_record_id(&self, id: i64) {
        self.inner.lock().call_record_id = Some(id);
    }

    pub fn push_fragment(&self, fragment: String) {
        self.inner.lock().transcript.push(fragment);
    }

    pub fn transcript_len(&self) -> usize {
        self.inner.lock().transcript.len()
    }

    /// Joined text and fragment count, plus the call identifier to persist it
    /// against.
    pub(crate) fn transcript_snapshot(&self) -> (Option<String>, String, usize) {
        let inner = self.inner.lock();
        (
            inner.call_sid.clone(),
            inner.transcript.joined(),
            inner.transcript.len(),
        )
    }

    pub(crate) fn drain_transcript(&self, count: usize) {
        self.inner.lock().transcript.drain_front(count);
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn upstream(&self) -> Option<&UpstreamConnection> {
        self.upstream.get()
    }

    pub fn attach_upstream(&self, upstream: UpstreamConnection) -> Result<(), RelayError> {
        self.upstream
            .set(upstream)
            .map_err(|_| RelayError::UpstreamAlreadyAttached)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            session_id: self.id,
            state: inner.state,
            stream_sid: inner.stream_sid.clone(),
            call_sid: inner.call_sid.clone(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("inner", &*self.inner.lock())
            .field("upstream", &self.upstream.get())
            .finish()
    }
}
