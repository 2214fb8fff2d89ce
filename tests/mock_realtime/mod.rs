//! Mock realtime endpoint
//!
//! Accepts WebSocket connections the way the conversational-AI realtime API
//! does, records every client event it receives, and replays scripted server
//! events on demand.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

/// Instruction for the connection currently being served
#[derive(Debug)]
pub enum MockCommand {
    /// Send a server event
    Send(Value),
    /// Close the connection from the server side
    Close,
}

/// Shared view of what the mock has seen
#[derive(Default)]
pub struct MockRealtimeState {
    pub received: Mutex<Vec<Value>>,
    pub authorization: Mutex<Option<String>>,
    pub beta_header: Mutex<Option<String>>,
    pub request_path: Mutex<Option<String>>,
    pub connections: AtomicUsize,
    pub closed: AtomicBool,
}

pub struct MockRealtimeServer {
    pub url: String,
    pub state: Arc<MockRealtimeState>,
    commands: mpsc::UnboundedSender<MockCommand>,
}

impl MockRealtimeServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockRealtimeState::default());
        let (commands, command_rx) = mpsc::unbounded_channel();

        let server_state = state.clone();
        tokio::spawn(async move {
            let command_rx = Arc::new(tokio::sync::Mutex::new(command_rx));
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                let command_rx = command_rx.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, state, command_rx).await;
                });
            }
        });

        Self {
            url: format!("ws://{addr}/v1/realtime"),
            state,
            commands,
        }
    }

    pub fn send(&self, event: Value) {
        let _ = self.commands.send(MockCommand::Send(event));
    }

    pub fn close(&self) {
        let _ = self.commands.send(MockCommand::Close);
    }

    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    pub fn received_types(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|v| v["type"].as_str().map(str::to_string))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    state: Arc<MockRealtimeState>,
    commands: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<MockCommand>>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let header_state = state.clone();
    let ws_stream = accept_hdr_async(stream, move |req: &Request, resp: Response| {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        *header_state.authorization.lock() = header("authorization");
        *header_state.beta_header.lock() = header("openai-beta");
        *header_state.request_path.lock() = Some(req.uri().to_string());
        Ok(resp)
    })
    .await?;

    state.connections.fetch_add(1, Ordering::SeqCst);
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(
            r#"{"type":"session.created","session":{"id":"sess_mock"}}"#.into(),
        ))
        .await?;

    let mut commands = commands.lock().await;
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(MockCommand::Send(event)) => {
                    write.send(Message::Text(event.to_string().into())).await?;
                }
                Some(MockCommand::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                        state.received.lock().push(value);
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.closed.store(true, Ordering::SeqCst);
    Ok(())
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
