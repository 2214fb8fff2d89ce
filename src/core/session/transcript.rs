use crate::store::{CallRecordStore, CallRecordUpdate, StoreResult};

use super::Session;

/// Text fragments received since the last successful flush.
#[derive(Debug, Default, Clone)]
pub struct TranscriptBuffer {
    fragments: Vec<String>,
}

impl TranscriptBuffer {
    pub fn push(&mut self, fragment: String) {
        self.fragments.push(fragment);
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragments concatenated in arrival order.
    pub fn joined(&self) -> String {
        self.fragments.concat()
    }

    /// Remove the oldest `count` fragments.
    pub fn drain_front(&mut self, count: usize) {
        let count = count.min(self.fragments.len());
        self.fragments.drain(..count);
    }
}

/// Persist the session's buffered fragments to its call record.
///
/// Returns the number of fragments persisted. Nothing is sent when the buffer
/// is empty or the call identifier is not known yet. On failure the buffer is
/// kept so the next flush retries with old and new fragments together.
pub async fn flush_transcript(session: &Session, calls: &dyn CallRecordStore) -> StoreResult<usize> {
    let (call_sid, text, count) = session.transcript_snapshot();
    let Some(call_sid) = call_sid else {
        return Ok(0);
    };
    if count == 0 {
        return Ok(0);
    }

    match calls
        .update_by_call_sid(&call_sid, CallRecordUpdate::records(text))
        .await
    {
        Ok(_) => {
            session.drain_transcript(count);
            tracing::debug!(
                session_id = %session.id(),
                call_sid = %call_sid,
                fragments = count,
                "Transcript flushed"
            );
            Ok(count)
        }
        Err(e) => {
            tracing::warn!(
                session_id = %session.id(),
                call_sid = %call_sid,
                pending = count,
                "Transcript flush failed, keeping buffer: {}",
                e
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{SessionId, SessionState};
    use crate::store::{CallRecord, MemoryStore, StoreError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` updates, recording every attempted body.
    struct FlakyStore {
        failures: AtomicUsize,
        attempts: Mutex<Vec<String>>,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                failures: AtomicUsize::new(failures),
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CallRecordStore for FlakyStore {
        async fn find_by_call_sid(&self, _call_sid: &str) -> StoreResult<Vec<CallRecord>> {
            Ok(Vec::new())
        }

        async fn update(&self, id: i64, _update: CallRecordUpdate) -> StoreResult<CallRecord> {
            Err(StoreError::NotFound(id.to_string()))
        }

        async fn update_by_call_sid(
            &self,
            call_sid: &str,
            update: CallRecordUpdate,
        ) -> StoreResult<CallRecord> {
            self.attempts
                .lock()
                .push(update.records.clone().unwrap_or_default());
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::RequestFailed("backend unavailable".to_string()));
            }
            Ok(CallRecord {
                id: 7,
                name: "Jane".to_string(),
                number: None,
                agent: None,
                status: None,
                call_sid: Some(call_sid.to_string()),
                records: update.records,
            })
        }
    }

    fn started_session() -> Session {
        let session = Session::new(SessionId::new());
        session
            .transition(SessionState::ConfiguredAwaitingStart)
            .unwrap();
        assert!(session.accept_start("MZ1", "CA1"));
        session
    }

    #[test]
    fn test_buffer_drain_front() {
        let mut buffer = TranscriptBuffer::default();
        buffer.push("a".to_string());
        buffer.push("b".to_string());
        buffer.push("c".to_string());
        buffer.drain_front(2);
        assert_eq!(buffer.joined(), "c");
        buffer.drain_front(10);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_flush_joins_and_clears() {
        let store = MemoryStore::new();
        store.insert_call(CallRecord {
            id: 7,
            name: "Jane".to_string(),
            number: None,
            agent: Some(1),
            status: None,
            call_sid: Some("CA1".to_string()),
            records: None,
        });

        let session = started_session();
        session.push_fragment("Hel".to_string());
        session.push_fragment("lo".to_string());

        assert_eq!(flush_transcript(&session, &store).await.unwrap(), 2);
        assert_eq!(session.transcript_len(), 0);
        assert_eq!(store.call(7).unwrap().records.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_flush_noop_without_call_sid_or_fragments() {
        let store = FlakyStore::new(0);

        let session = Session::new(SessionId::new());
        session.push_fragment("orphan".to_string());
        assert_eq!(flush_transcript(&session, &store).await.unwrap(), 0);
        assert_eq!(session.transcript_len(), 1);

        let session = started_session();
        assert_eq!(flush_transcript(&session, &store).await.unwrap(), 0);
        assert!(store.attempts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_flush_retries_after_failures_without_loss() {
        let store = FlakyStore::new(2);
        let session = started_session();

        session.push_fragment("Hel".to_string());
        assert!(flush_transcript(&session, &store).await.is_err());

        session.push_fragment("lo".to_string());
        assert!(flush_transcript(&session, &store).await.is_err());
        assert_eq!(session.transcript_len(), 2);

        session.push_fragment(" there".to_string());
        assert_eq!(flush_transcript(&session, &store).await.unwrap(), 3);
        assert_eq!(session.transcript_len(), 0);

        let attempts = store.attempts.lock().clone();
        assert_eq!(attempts, vec!["Hel", "Hello", "Hello there"]);
    }
}
