//! Telephony voice webhook.
//!
//! When the outbound call is answered the telephony provider fetches
//! instructions from this endpoint. The answer tells it to open a media
//! stream to the relay path on this server.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::routes::MEDIA_STREAM_PATH;
use crate::state::AppState;

/// `POST /call-log/outbound-call-handler`
pub async fn outbound_call_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let host = state.config.public_host.clone().or_else(|| {
        headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let Some(host) = host else {
        tracing::warn!("Outbound call webhook without public host or Host header");
        return (StatusCode::BAD_REQUEST, "Missing Host header").into_response();
    };

    tracing::info!(host = %host, "Answering outbound call webhook");

    (
        [(header::CONTENT_TYPE, "text/xml")],
        stream_connect_document(&host),
    )
        .into_response()
}

/// Document instructing the provider to stream call audio to `host`.
pub fn stream_connect_document(host: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Connect><Stream url="wss://{}{}" /></Connect></Response>"#,
        escape_xml(host),
        MEDIA_STREAM_PATH
    )
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_connect_document() {
        assert_eq!(
            stream_connect_document("relay.example.com"),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Connect><Stream url="wss://relay.example.com/media-stream" /></Connect></Response>"#
        );
    }

    #[test]
    fn test_host_is_escaped() {
        let doc = stream_connect_document(r#"evil.com"/><Hangup"#);
        assert!(doc.contains("evil.com&quot;/&gt;&lt;Hangup"));
        assert!(!doc.contains("<Hangup"));
    }
}
