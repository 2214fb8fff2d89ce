//! Relay orchestration for one session: dialing upstream, activation on the
//! telephony `start` event, frame pumping in both directions, and teardown.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use zeroize::Zeroizing;

use super::{RelayError, Session, SessionState, flush_transcript};
use crate::core::realtime::{
    ClientEvent, RealtimeSettings, ServerEventCallback, UpstreamConnection, UpstreamError,
};
use crate::core::telephony::TelephonyOutbound;
use crate::core::translator::{
    InboundAction, UpstreamAction, build_instructions, translate_telephony, translate_upstream,
};
use crate::store::{CallRecordUpdate, CallStatus, Stores};

/// Whether the telephony reader should keep going after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFlow {
    Continue,
    Close,
}

/// Shared, per-process dependencies of every relay session.
pub struct RelayContext {
    stores: Stores,
    realtime: RealtimeSettings,
    /// Used when the config store has no credential
    fallback_api_key: Option<Zeroizing<String>>,
}

impl RelayContext {
    pub fn new(
        stores: Stores,
        realtime: RealtimeSettings,
        fallback_api_key: Option<String>,
    ) -> Self {
        Self {
            stores,
            realtime,
            fallback_api_key: fallback_api_key
                .filter(|k| !k.trim().is_empty())
                .map(Zeroizing::new),
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn realtime(&self) -> &RealtimeSettings {
        &self.realtime
    }

    /// Fetch the upstream credential, preferring the config store.
    pub async fn resolve_api_key(&self) -> Result<Zeroizing<String>, RelayError> {
        let key = &self.realtime.api_key_config_key;
        match self.stores.settings.get_config_by_key(key).await {
            Ok(Some(value)) if !value.trim().is_empty() => return Ok(Zeroizing::new(value)),
            Ok(_) => tracing::debug!("Config store has no value for {}", key),
            Err(e) => tracing::warn!("Failed to read {} from config store: {}", key, e),
        }
        self.fallback_api_key
            .clone()
            .ok_or(RelayError::MissingCredential)
    }

    /// Dial the realtime endpoint for `session` and move it to
    /// `ConfiguredAwaitingStart`.
    ///
    /// Audio produced upstream is queued on `telephony_tx`.
    pub async fn open_upstream(
        &self,
        session: &Arc<Session>,
        telephony_tx: mpsc::Sender<TelephonyOutbound>,
    ) -> Result<(), RelayError> {
        let api_key = self.resolve_api_key().await?;

        let upstream = UpstreamConnection::connect(
            &self.realtime.endpoint(),
            &api_key,
            self.realtime.connect_timeout,
            session.cancel_token().clone(),
            self.upstream_handler(session, telephony_tx),
        )
        .await?;

        session.attach_upstream(upstream)?;
        session.transition(SessionState::ConfiguredAwaitingStart)?;
        watch_for_close(session);
        Ok(())
    }

    /// Callback applying realtime server events to `session`.
    pub fn upstream_handler(
        &self,
        session: &Arc<Session>,
        telephony_tx: mpsc::Sender<TelephonyOutbound>,
    ) -> ServerEventCallback {
        let session: Weak<Session> = Arc::downgrade(session);
        let calls = self.stores.calls.clone();

        Arc::new(move |event| {
            let session = session.clone();
            let calls = calls.clone();
            let telephony_tx = telephony_tx.clone();

            Box::pin(async move {
                let Some(session) = session.upgrade() else {
                    return;
                };
                let stream_sid = session.stream_sid();

                match translate_upstream(event, stream_sid.as_deref()) {
                    UpstreamAction::AppendTranscript(fragment) => session.push_fragment(fragment),
                    UpstreamAction::SendToTelephony(frame) => {
                        if !session.is_active() {
                            tracing::debug!(
                                session_id = %session.id(),
                                "Dropping upstream audio, session is {}",
                                session.state()
                            );
                            return;
                        }
                        if telephony_tx.send(frame).await.is_err() {
                            tracing::debug!(
                                session_id = %session.id(),
                                "Telephony writer gone, dropping upstream audio"
                            );
                        }
                    }
                    UpstreamAction::FlushTranscript => {
                        // Failures are logged and the buffer kept for the next flush.
                        let _ = flush_transcript(&session, calls.as_ref()).await;
                    }
                    UpstreamAction::Ignore => {}
                }
            })
        })
    }

    /// Apply one telephony text frame.
    ///
    /// Malformed frames are dropped. An error means the session must close.
    pub async fn handle_telephony_frame(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<RelayFlow, RelayError> {
        let action = match translate_telephony(text) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(session_id = %session.id(), "Dropping telephony frame: {}", e);
                return Ok(RelayFlow::Continue);
            }
        };

        match action {
            InboundAction::Start {
                stream_sid,
                call_sid,
            } => {
                self.activate(session, &stream_sid, &call_sid).await?;
                Ok(RelayFlow::Continue)
            }
            InboundAction::ForwardAudio(event) => {
                self.forward_audio(session, event).await;
                Ok(RelayFlow::Continue)
            }
            InboundAction::Stop => {
                tracing::info!(
                    session_id = %session.id(),
                    call_sid = ?session.call_sid(),
                    "Telephony stream stopped"
                );
                Ok(RelayFlow::Close)
            }
            InboundAction::Ignore => Ok(RelayFlow::Continue),
        }
    }

    /// Resolve the call, configure the conversation, and go `Active`.
    async fn activate(
        &self,
        session: &Session,
        stream_sid: &str,
        call_sid: &str,
    ) -> Result<(), RelayError> {
        if !session.accept_start(stream_sid, call_sid) {
            tracing::warn!(
                session_id = %session.id(),
                call_sid = %call_sid,
                "Ignoring start event, session is {}",
                session.state()
            );
            return Ok(());
        }

        tracing::info!(
            session_id = %session.id(),
            stream_sid = %stream_sid,
            call_sid = %call_sid,
            "Telephony stream started"
        );

        let record = self
            .stores
            .calls
            .find_by_call_sid(call_sid)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::CallRecordNotFound(call_sid.to_string()))?;
        session.set_call_record_id(record.id);

        let agent_id = record.agent.ok_or(RelayError::NoAgentAssigned(record.id))?;
        let agent = self
            .stores
            .agents
            .find_one(agent_id)
            .await?
            .ok_or(RelayError::AgentNotFound(agent_id))?;

        let instructions = build_instructions(&agent.prompt, &record.name);

        tokio::time::sleep(self.realtime.settle_delay).await;

        let upstream = session
            .upstream()
            .ok_or(RelayError::Upstream(UpstreamError::NotConnected))?;
        upstream
            .send(ClientEvent::SessionUpdate {
                session: self.realtime.session_config(instructions),
            })
            .await?;

        session.transition(SessionState::Active)?;
        tracing::info!(
            session_id = %session.id(),
            call_record_id = record.id,
            agent_id,
            "Conversation configured"
        );

        if let Err(e) = self
            .stores
            .calls
            .update(record.id, CallRecordUpdate::status(CallStatus::Called))
            .await
        {
            tracing::warn!(
                session_id = %session.id(),
                call_record_id = record.id,
                "Failed to mark call as called: {}",
                e
            );
        }

        Ok(())
    }

    async fn forward_audio(&self, session: &Session, event: ClientEvent) {
        if !session.is_active() {
            tracing::debug!(
                session_id = %session.id(),
                "Dropping caller audio, session is {}",
                session.state()
            );
            return;
        }

        let Some(upstream) = session.upstream().filter(|u| u.is_open()) else {
            tracing::debug!(session_id = %session.id(), "Dropping caller audio, upstream closed");
            return;
        };

        if let Err(e) = upstream.send(event).await {
            tracing::debug!(session_id = %session.id(), "Failed to forward caller audio: {}", e);
        }
    }

    /// Close the upstream leg and persist what is left of the transcript.
    ///
    /// Leaves the session in `Closing`; the owner removes it from the registry.
    pub async fn shutdown(&self, session: &Session) {
        if session.begin_closing() {
            tracing::info!(
                session_id = %session.id(),
                call_sid = ?session.call_sid(),
                "Closing relay session"
            );
        }
        session.cancel_token().cancel();

        if let Some(upstream) = session.upstream() {
            upstream.close().await;
        }

        let _ = flush_transcript(session, self.stores.calls.as_ref()).await;
    }
}

impl std::fmt::Debug for RelayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayContext")
            .field("realtime", &self.realtime)
            .field("fallback_api_key", &self.fallback_api_key.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

/// Move `session` to `Closing` as soon as its token is cancelled, whichever
/// leg ended first.
fn watch_for_close(session: &Arc<Session>) {
    let token = session.cancel_token().clone();
    let session = Arc::downgrade(session);
    tokio::spawn(async move {
        token.cancelled().await;
        if let Some(session) = session.upgrade()
            && session.begin_closing()
        {
            tracing::info!(
                session_id = %session.id(),
                call_sid = ?session.call_sid(),
                "Relay leg ended, session closing"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::ServerEvent;
    use crate::core::session::SessionRegistry;
    use crate::store::{Agent, CallRecord, MemoryStore};
    use std::time::Duration;

    fn context(store: Arc<MemoryStore>, fallback: Option<&str>) -> RelayContext {
        RelayContext::new(
            Stores::from_backend(store),
            RealtimeSettings {
                settle_delay: Duration::ZERO,
                ..Default::default()
            },
            fallback.map(str::to_string),
        )
    }

    fn jane(agent: Option<i64>) -> CallRecord {
        CallRecord {
            id: 7,
            name: "Jane".to_string(),
            number: None,
            agent,
            status: None,
            call_sid: Some("CA1".to_string()),
            records: None,
        }
    }

    fn awaiting_session(registry: &SessionRegistry) -> Arc<Session> {
        let session = registry.create();
        session
            .transition(SessionState::ConfiguredAwaitingStart)
            .unwrap();
        session
    }

    const START: &str = r#"{"event":"start","start":{"streamSid":"MZ1","callSid":"CA1"}}"#;

    #[tokio::test]
    async fn test_api_key_prefers_config_store() {
        let store = Arc::new(MemoryStore::new());
        store.set_config("openai_api_key", "sk-store");
        let ctx = context(store, Some("sk-env"));
        assert_eq!(ctx.resolve_api_key().await.unwrap().as_str(), "sk-store");
    }

    #[tokio::test]
    async fn test_api_key_fallback_and_missing() {
        let ctx = context(Arc::new(MemoryStore::new()), Some("sk-env"));
        assert_eq!(ctx.resolve_api_key().await.unwrap().as_str(), "sk-env");

        let ctx = context(Arc::new(MemoryStore::new()), Some("  "));
        assert!(matches!(
            ctx.resolve_api_key().await,
            Err(RelayError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn test_start_without_call_record_is_fatal() {
        let ctx = context(Arc::new(MemoryStore::new()), None);
        let registry = SessionRegistry::new();
        let session = awaiting_session(&registry);

        let result = ctx.handle_telephony_frame(&session, START).await;
        assert!(matches!(result, Err(RelayError::CallRecordNotFound(ref sid)) if sid == "CA1"));
        assert_ne!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_start_with_missing_agent_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.insert_call(jane(None));
        let ctx = context(store.clone(), None);
        let registry = SessionRegistry::new();

        let session = awaiting_session(&registry);
        assert!(matches!(
            ctx.handle_telephony_frame(&session, START).await,
            Err(RelayError::NoAgentAssigned(7))
        ));

        store.insert_call(jane(Some(3)));
        let session = awaiting_session(&registry);
        assert!(matches!(
            ctx.handle_telephony_frame(&session, START).await,
            Err(RelayError::AgentNotFound(3))
        ));
        assert_eq!(session.call_record_id(), Some(7));
    }

    #[tokio::test]
    async fn test_start_without_upstream_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.insert_call(jane(Some(1)));
        store.insert_agent(Agent {
            id: 1,
            prompt: "Be polite.".to_string(),
        });
        let ctx = context(store, None);
        let registry = SessionRegistry::new();
        let session = awaiting_session(&registry);

        assert!(matches!(
            ctx.handle_telephony_frame(&session, START).await,
            Err(RelayError::Upstream(UpstreamError::NotConnected))
        ));
        assert_eq!(session.state(), SessionState::ConfiguredAwaitingStart);
    }

    #[tokio::test]
    async fn test_frames_before_activation() {
        let ctx = context(Arc::new(MemoryStore::new()), None);
        let registry = SessionRegistry::new();
        let session = awaiting_session(&registry);

        let media = r#"{"event":"media","media":{"payload":"AAAA"}}"#;
        assert_eq!(
            ctx.handle_telephony_frame(&session, media).await.unwrap(),
            RelayFlow::Continue
        );
        assert_eq!(
            ctx.handle_telephony_frame(&session, "{not json").await.unwrap(),
            RelayFlow::Continue
        );
        assert_eq!(
            ctx.handle_telephony_frame(&session, r#"{"event":"stop"}"#)
                .await
                .unwrap(),
            RelayFlow::Close
        );
        assert_eq!(session.state(), SessionState::ConfiguredAwaitingStart);
    }

    #[tokio::test]
    async fn test_upstream_events_drive_transcript_and_audio() {
        let store = Arc::new(MemoryStore::new());
        store.insert_call(jane(Some(1)));
        let ctx = context(store.clone(), None);
        let registry = SessionRegistry::new();
        let session = awaiting_session(&registry);
        assert!(session.accept_start("MZ1", "CA1"));
        session.transition(SessionState::Active).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let handler = ctx.upstream_handler(&session, tx);

        handler(ServerEvent::ContentDelta {
            delta: "Hel".to_string(),
        })
        .await;
        handler(ServerEvent::Unknown).await;
        handler(ServerEvent::ContentDelta {
            delta: "lo".to_string(),
        })
        .await;
        assert_eq!(session.transcript_len(), 2);
        assert_eq!(session.state(), SessionState::Active);

        handler(ServerEvent::AudioDelta {
            delta: "AAAA".to_string(),
            item_id: None,
        })
        .await;
        assert_eq!(
            rx.recv().await.unwrap(),
            TelephonyOutbound::media("MZ1", "AAAA")
        );

        handler(ServerEvent::ResponseDone { response: None }).await;
        assert_eq!(session.transcript_len(), 0);
        assert_eq!(store.call(7).unwrap().records.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_shutdown_flushes_remaining_transcript() {
        let store = Arc::new(MemoryStore::new());
        store.insert_call(jane(Some(1)));
        let ctx = context(store.clone(), None);
        let registry = SessionRegistry::new();
        let session = awaiting_session(&registry);
        assert!(session.accept_start("MZ1", "CA1"));
        session.push_fragment("Bye".to_string());

        ctx.shutdown(&session).await;

        assert_eq!(session.state(), SessionState::Closing);
        assert!(session.cancel_token().is_cancelled());
        assert_eq!(store.call(7).unwrap().records.as_deref(), Some("Bye"));
    }

    #[tokio::test]
    async fn test_cancelled_session_moves_to_closing() {
        let registry = SessionRegistry::new();
        let session = awaiting_session(&registry);
        assert!(session.accept_start("MZ1", "CA1"));
        session.transition(SessionState::Active).unwrap();

        watch_for_close(&session);
        assert_eq!(session.state(), SessionState::Active);

        session.cancel_token().cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while session.state() != SessionState::Closing {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session should be closing once its token is cancelled");
        assert_eq!(registry.snapshot()[0].state, SessionState::Closing);
    }
}
