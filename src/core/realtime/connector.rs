//! WebSocket connection to the realtime endpoint.
//!
//! The connection owns a background task that multiplexes three sources:
//! - the shutdown token (session teardown or [`UpstreamConnection::close`])
//! - queued outbound [`ClientEvent`]s
//! - inbound frames, parsed into [`ServerEvent`]s and handed to the callback
//!
//! Inbound events are delivered one at a time and the callback is awaited
//! before the next frame is read, so the relay observes them in arrival order.
//! When the connection ends for any reason the session token is cancelled.
//! There is no reconnection: a lost upstream ends the relay session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use super::messages::{ClientEvent, ServerEvent};
use super::{ServerEventCallback, UpstreamError, UpstreamResult};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// How long `close` waits for the connection task to say goodbye.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// An open connection to the realtime endpoint.
pub struct UpstreamConnection {
    sender: mpsc::Sender<ClientEvent>,
    /// Shared with the connection task
    open: Arc<AtomicBool>,
    /// Child of the session token
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl UpstreamConnection {
    /// Dial `endpoint` and start the connection task.
    ///
    /// The dial gives up after `connect_timeout`, or as soon as
    /// `session_cancel` fires. Once connected, `session_cancel` is cancelled
    /// when the connection ends, and cancelling it closes the connection.
    pub async fn connect(
        endpoint: &str,
        api_key: &str,
        connect_timeout: Duration,
        session_cancel: CancellationToken,
        on_event: ServerEventCallback,
    ) -> UpstreamResult<Self> {
        let request = build_request(endpoint, api_key)?;

        let dial = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request));
        let (ws_stream, _response) = tokio::select! {
            _ = session_cancel.cancelled() => return Err(UpstreamError::Cancelled),
            result = dial => match result {
                Ok(connected) => {
                    connected.map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?
                }
                Err(_) => return Err(UpstreamError::ConnectTimeout(connect_timeout)),
            },
        };

        tracing::info!("Connected to realtime endpoint");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);

        let open = Arc::new(AtomicBool::new(true));
        let shutdown = session_cancel.child_token();

        let task_open = open.clone();
        let task_shutdown = shutdown.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = task_shutdown.cancelled() => {
                        if let Err(e) = ws_sink.send(Message::Close(None)).await {
                            tracing::debug!("Failed to send close frame upstream: {}", e);
                        }
                        break;
                    }

                    Some(event) = rx.recv() => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            tracing::error!("Failed to send WebSocket message: {}", e);
                            break;
                        }
                    }

                    msg = ws_stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => on_event(event).await,
                                    Err(e) => {
                                        tracing::warn!("Failed to parse server event: {} - {}", e, text);
                                    }
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                tracing::info!("Realtime endpoint closed the connection: {:?}", frame);
                                break;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::error!("Realtime WebSocket error: {}", e);
                                break;
                            }
                            None => {
                                tracing::info!("Realtime stream ended");
                                break;
                            }
                        }
                    }
                }
            }

            task_open.store(false, Ordering::SeqCst);
            session_cancel.cancel();
            tracing::debug!("Realtime connection task finished");
        });

        Ok(Self {
            sender: tx,
            open,
            shutdown,
            handle: Mutex::new(Some(handle)),
        })
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Queue an event for the endpoint.
    pub async fn send(&self, event: ClientEvent) -> UpstreamResult<()> {
        if !self.is_open() {
            return Err(UpstreamError::NotConnected);
        }
        self.sender
            .send(event)
            .await
            .map_err(|e| UpstreamError::SendFailed(e.to_string()))
    }

    /// Close the connection and wait for the task to finish. Idempotent.
    pub async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.shutdown.cancel();

        let handle = self.handle.lock().take();
        if let Some(mut handle) = handle
            && tokio::time::timeout(CLOSE_TIMEOUT, &mut handle).await.is_err()
        {
            tracing::warn!("Realtime connection task did not stop in time, aborting");
            handle.abort();
        }
    }
}

impl Drop for UpstreamConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for UpstreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConnection")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

/// Handshake request carrying the bearer credential and protocol opt-in.
fn build_request(endpoint: &str, api_key: &str) -> UpstreamResult<Request> {
    let mut request = endpoint
        .into_client_request()
        .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;

    let bearer = Zeroizing::new(format!("Bearer {api_key}"));
    let mut auth = HeaderValue::from_str(&bearer).map_err(|_| {
        UpstreamError::InvalidRequest("API key contains invalid header characters".to_string())
    })?;
    auth.set_sensitive(true);

    let headers = request.headers_mut();
    headers.insert(AUTHORIZATION, auth);
    headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    Ok(request)
}
