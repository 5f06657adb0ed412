//! Live Slack-style RTM session.
//!
//! The handshake is an HTTP `rtm.connect` call returning a WebSocket URL and
//! the bot identity; events then arrive as JSON text frames on that socket.
//! Messages are posted through the HTTP `chat.postMessage` method.

use std::fmt::Display;

use async_trait::async_trait;
use futures::{FutureExt, Sink, SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use gobble_core::{
    RawEvent, RealtimeSession, SendAck, SessionIdentity, TransportError, TransportResult,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    ok: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "self")]
    bot: Option<SessionIdentity>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    message: Option<PostedMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostedMessage {
    #[serde(default)]
    text: Option<String>,
}

/// RTM session over reqwest and tokio-tungstenite.
pub struct SlackRtmSession {
    http: reqwest::Client,
    api_base: String,
    token: RwLock<Option<String>>,
    socket: Mutex<Option<WsStream>>,
}

impl Default for SlackRtmSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SlackRtmSession {
    /// Creates a session against the public API.
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Creates a session against a custom API base URL.
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
            socket: Mutex::new(None),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn handshake(&self, token: &str) -> TransportResult<(String, SessionIdentity)> {
        let response = self
            .http
            .post(self.method_url("rtm.connect"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TransportError::connection_failed(format!("rtm.connect: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::connection_failed(format!(
                "rtm.connect returned HTTP {status}"
            )));
        }

        let body: ConnectResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("rtm.connect body: {e}")))?;
        if !body.ok {
            let reason = body.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(TransportError::connection_failed(reason));
        }

        match (body.url, body.bot) {
            (Some(url), Some(bot)) => Ok((url, bot)),
            _ => Err(TransportError::Protocol(
                "rtm.connect response is missing url or self".to_string(),
            )),
        }
    }

    /// Turns one frame into events; `Ok(None)` for frames carrying no event.
    ///
    /// A pong that cannot be written means the socket is gone.
    async fn handle_frame<S>(
        socket: &mut S,
        frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> TransportResult<Option<RawEvent>>
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
    {
        match frame {
            Some(Ok(Message::Text(text))) => {
                trace!(len = text.len(), "Received text frame");
                match RawEvent::from_json(text.as_str()) {
                    Ok(event) => Ok(Some(event)),
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable frame");
                        Ok(None)
                    }
                }
            }
            Some(Ok(Message::Ping(data))) => {
                trace!("Received ping, sending pong");
                socket.send(Message::Pong(data)).await.map_err(|e| {
                    debug!(error = %e, "Failed to answer ping");
                    TransportError::ReadFailed(format!("pong: {e}"))
                })?;
                Ok(None)
            }
            Some(Ok(Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => Ok(None),
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.as_str().to_string())
                    .unwrap_or_else(|| "no reason".to_string());
                Err(TransportError::closed(reason))
            }
            Some(Err(e)) => Err(TransportError::ReadFailed(e.to_string())),
            None => Err(TransportError::closed("stream ended")),
        }
    }
}

#[async_trait]
impl RealtimeSession for SlackRtmSession {
    async fn connect(&self, token: &str) -> TransportResult<SessionIdentity> {
        let (url, identity) = self.handshake(token).await?;

        info!(bot_id = %identity.id, bot_name = %identity.name, "Opening RTM socket");
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::connection_failed(format!("WebSocket connect: {e}")))?;

        let previous = self.socket.lock().await.replace(stream);
        if let Some(mut old) = previous {
            let _ = old.close(None).await;
        }
        *self.token.write() = Some(token.to_string());

        info!(bot_id = %identity.id, "RTM session connected");
        Ok(identity)
    }

    async fn read_events(&self) -> TransportResult<Vec<RawEvent>> {
        let mut guard = self.socket.lock().await;
        let socket = guard.as_mut().ok_or(TransportError::NotConnected)?;

        // Wait for one frame, then take whatever else is already buffered.
        let mut events = Vec::new();
        let mut frame = socket.next().await;
        loop {
            match Self::handle_frame(socket, frame).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    debug!(error = %e, "RTM socket lost");
                    *guard = None;
                    return Err(e);
                }
            }
            match socket.next().now_or_never() {
                Some(next) => frame = next,
                None => break,
            }
        }
        Ok(events)
    }

    async fn send(&self, channel: &str, text: &str, as_self: bool) -> TransportResult<SendAck> {
        let token = self.token.read().clone().ok_or(TransportError::NotConnected)?;

        let response = self
            .http
            .post(self.method_url("chat.postMessage"))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "channel": channel,
                "text": text,
                "as_user": as_self,
            }))
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::SendFailed(format!("HTTP {status}")));
        }

        let body: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("chat.postMessage body: {e}")))?;

        Ok(SendAck {
            ok: body.ok,
            timestamp: body.ts,
            text: body.message.and_then(|m| m.text),
            channel: body.channel,
            error: body.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_response() {
        let body: ConnectResponse = serde_json::from_str(
            r#"{"ok": true, "url": "wss://example.invalid/ws",
                "self": {"id": "UJFIDFJDFAKE", "name": "edi", "created": 1459600186},
                "team": {"id": "T1"}}"#,
        )
        .unwrap();
        assert!(body.ok);
        assert_eq!(body.bot, Some(SessionIdentity::new("UJFIDFJDFAKE", "edi")));
    }

    #[test]
    fn test_post_message_response() {
        let body: PostMessageResponse = serde_json::from_str(
            r#"{"ok": true, "channel": "C1", "ts": "1459618786.000032",
                "message": {"text": "pong", "type": "message"}}"#,
        )
        .unwrap();
        assert_eq!(body.ts.as_deref(), Some("1459618786.000032"));
        assert_eq!(body.message.and_then(|m| m.text).as_deref(), Some("pong"));

        let failed: PostMessageResponse =
            serde_json::from_str(r#"{"ok": false, "error": "not_in_channel"}"#).unwrap();
        assert!(!failed.ok);
        assert_eq!(failed.error.as_deref(), Some("not_in_channel"));
    }

    #[tokio::test]
    async fn test_frames() {
        let (mut sink, mut outgoing) = futures::channel::mpsc::unbounded::<Message>();

        let text = Message::text(r#"{"type": "message", "text": "edi hi"}"#);
        let event = SlackRtmSession::handle_frame(&mut sink, Some(Ok(text)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.text(), Some("edi hi"));

        let ping = Message::Ping(vec![1, 2].into());
        assert!(matches!(
            SlackRtmSession::handle_frame(&mut sink, Some(Ok(ping))).await,
            Ok(None)
        ));
        assert_eq!(outgoing.next().await, Some(Message::Pong(vec![1, 2].into())));

        assert!(matches!(
            SlackRtmSession::handle_frame(&mut sink, None).await,
            Err(TransportError::ConnectionClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_pong_drops_socket() {
        let (mut sink, outgoing) = futures::channel::mpsc::unbounded::<Message>();
        drop(outgoing);

        let ping = Message::Ping(vec![7].into());
        assert!(matches!(
            SlackRtmSession::handle_frame(&mut sink, Some(Ok(ping))).await,
            Err(TransportError::ReadFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_unconnected_session() {
        let session = SlackRtmSession::with_api_base("http://127.0.0.1:9/api/");
        assert_eq!(session.method_url("rtm.connect"), "http://127.0.0.1:9/api/rtm.connect");
        assert!(matches!(
            session.read_events().await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            session.send("C1", "hi", true).await,
            Err(TransportError::NotConnected)
        ));
    }
}
