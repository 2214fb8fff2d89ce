use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};

use crate::core::realtime::UpstreamError;
use crate::core::session::{RelayError, RelayFlow, Session, SessionState};
use crate::core::telephony::TelephonyOutbound;
use crate::state::{AppState, RelaySlot};

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Telephony frames kept while the realtime endpoint is being dialed
const MAX_PENDING_FRAMES: usize = 256;

/// How long teardown waits for the writer to send its close frame
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Media stream WebSocket handler
///
/// Upgrades the connection and runs the relay session. The connection slot
/// reserved by the connection-limit middleware is held until the session ends.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(slot): Extension<RelaySlot>,
) -> Response {
    info!("Media stream WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            handle_media_stream_socket(socket, state).await;
            drop(slot);
        })
}

async fn handle_media_stream_socket(socket: WebSocket, state: Arc<AppState>) {
    let session = state.sessions.create();
    let session_id = session.id();
    info!(%session_id, "Media stream connection established");

    let (mut sender, mut receiver) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<TelephonyOutbound>(CHANNEL_BUFFER_SIZE);

    let cancel = session.cancel_token().clone();

    // Writer task: assistant audio out, close frame once the session is cancelled
    let writer_cancel = cancel.clone();
    let mut sender_task = tokio::spawn(async move {
        loop {
            select! {
                biased;

                _ = writer_cancel.cancelled() => break,

                Some(frame) = frame_rx.recv() => {
                    let json = match serde_json::to_string(&frame) {
                        Ok(j) => j,
                        Err(e) => {
                            error!("Failed to serialize telephony frame: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sender.send(Message::Text(json.into())).await {
                        warn!("Failed to send telephony frame: {}", e);
                        writer_cancel.cancel();
                        break;
                    }
                }
            }
        }

        if let Err(e) = sender.send(Message::Close(None)).await {
            debug!("Failed to send close frame to telephony: {}", e);
        }
    });

    let mut pending = Vec::new();
    match open_upstream_while_listening(&state, &session, frame_tx.clone(), &mut receiver, &mut pending)
        .await
    {
        Ok(()) => {
            info!(%session_id, "Realtime connection open, awaiting stream start");
            relay_loop(&state, &session, &mut receiver, pending).await;
        }
        Err(RelayError::Upstream(UpstreamError::Cancelled)) => {
            info!(%session_id, "Media stream ended before the realtime connection opened");
        }
        Err(e) => {
            error!(%session_id, "Failed to open realtime connection: {}", e);
        }
    }

    drop(frame_tx);
    state.relay.shutdown(&session).await;

    if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        warn!(%session_id, "Telephony writer did not stop in time, aborting");
        sender_task.abort();
    }

    state.sessions.remove(&session_id);
    if let Err(e) = session.transition(SessionState::Closed) {
        debug!(%session_id, "Unexpected state at close: {}", e);
    }

    info!(%session_id, "Media stream connection terminated");
}

/// Dial the realtime endpoint while still watching the telephony socket.
///
/// Text frames that arrive during the dial are kept in `pending` for replay.
/// A telephony close cancels the session, which aborts the dial.
async fn open_upstream_while_listening(
    state: &AppState,
    session: &Arc<Session>,
    frame_tx: mpsc::Sender<TelephonyOutbound>,
    receiver: &mut SplitStream<WebSocket>,
    pending: &mut Vec<Utf8Bytes>,
) -> Result<(), RelayError> {
    let session_id = session.id();
    let open = state.relay.open_upstream(session, frame_tx);
    tokio::pin!(open);

    let mut telephony_open = true;
    loop {
        select! {
            result = &mut open => return result,

            msg = receiver.next(), if telephony_open => match msg {
                Some(Ok(Message::Text(text))) => {
                    if pending.len() < MAX_PENDING_FRAMES {
                        pending.push(text);
                    } else {
                        debug!(%session_id, "Dropping telephony frame received while dialing");
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(%session_id, "Media stream closed while dialing realtime endpoint");
                    telephony_open = false;
                    session.cancel_token().cancel();
                }
                Some(Err(e)) => {
                    warn!(%session_id, "Media stream WebSocket error while dialing: {}", e);
                    telephony_open = false;
                    session.cancel_token().cancel();
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Apply one telephony text frame. Returns `false` when the session must end.
async fn apply_frame(state: &AppState, session: &Session, text: &str) -> bool {
    match state.relay.handle_telephony_frame(session, text).await {
        Ok(RelayFlow::Continue) => true,
        Ok(RelayFlow::Close) => false,
        Err(e) => {
            error!(session_id = %session.id(), "Relay session failed: {}", e);
            false
        }
    }
}

/// Read telephony frames until either leg ends, starting with any frames
/// buffered during the dial.
async fn relay_loop(
    state: &AppState,
    session: &Session,
    receiver: &mut SplitStream<WebSocket>,
    pending: Vec<Utf8Bytes>,
) {
    let session_id = session.id();
    let cancel = session.cancel_token();

    for text in pending {
        if !apply_frame(state, session, text.as_str()).await {
            return;
        }
    }

    loop {
        select! {
            _ = cancel.cancelled() => {
                info!(%session_id, "Realtime leg closed, closing media stream");
                break;
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !apply_frame(state, session, text.as_str()).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(%session_id, "Media stream closed by telephony");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!(%session_id, "Ignoring binary frame on media stream");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%session_id, "Media stream WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}
