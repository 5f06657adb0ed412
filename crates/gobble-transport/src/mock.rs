//! Scripted in-memory session.
//!
//! [`MockSession`] stands in for the live backend in tests and demos. Connect
//! outcomes and read batches are queued up front (or while the bot runs) and
//! consumed in order; everything the bot sends is recorded.
//!
//! ```rust,ignore
//! let session = Arc::new(MockSession::new());
//! session.fail_connect(TransportError::connection_failed("dns"));
//! session.push_event(json!({"type": "message", "user": "U1", "text": "edi hi", "channel": "C1"}));
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use gobble_core::{
    RawEvent, RealtimeSession, SendAck, SessionIdentity, TransportError, TransportResult,
};

/// Identity reported by a [`MockSession`] unless overridden.
pub const MOCK_BOT_ID: &str = "UJFIDFJDFAKE";
/// Name reported by a [`MockSession`] unless overridden.
pub const MOCK_BOT_NAME: &str = "edi";

/// A message recorded by [`MockSession::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: String,
    pub text: String,
    pub as_self: bool,
}

#[derive(Default)]
struct MockState {
    connected: bool,
    connect_attempts: usize,
    tokens: Vec<String>,
    connect_failures: VecDeque<TransportError>,
    reads: VecDeque<TransportResult<Vec<RawEvent>>>,
    send_rejections: VecDeque<String>,
    sent: Vec<SentMessage>,
    next_ts: u64,
}

/// A deterministic [`RealtimeSession`] double.
///
/// `connect` succeeds for any non-empty token unless a failure was queued
/// with [`fail_connect`](Self::fail_connect). `read_events` waits until a
/// batch or error is queued. A read error drops the connection, so the next
/// read fails with [`TransportError::NotConnected`] until reconnected.
pub struct MockSession {
    identity: SessionIdentity,
    state: Mutex<MockState>,
    ready: Notify,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    /// Creates a session reporting the default `edi` identity.
    pub fn new() -> Self {
        Self::with_identity(SessionIdentity::new(MOCK_BOT_ID, MOCK_BOT_NAME))
    }

    /// Creates a session reporting `identity` on connect.
    pub fn with_identity(identity: SessionIdentity) -> Self {
        Self {
            identity,
            state: Mutex::new(MockState::default()),
            ready: Notify::new(),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Queues a failure for the next connect attempt.
    pub fn fail_connect(&self, error: TransportError) {
        self.state.lock().connect_failures.push_back(error);
    }

    /// Queues `times` identical connect failures.
    pub fn fail_connect_times(&self, times: usize, reason: &str) {
        let mut state = self.state.lock();
        for _ in 0..times {
            state
                .connect_failures
                .push_back(TransportError::connection_failed(reason));
        }
    }

    /// Queues one batch of events.
    pub fn push_events<I, E>(&self, events: I)
    where
        I: IntoIterator<Item = E>,
        E: Into<RawEvent>,
    {
        let batch = events.into_iter().map(Into::into).collect();
        self.push_read(Ok(batch));
    }

    /// Queues a batch holding a single event.
    pub fn push_event(&self, event: impl Into<RawEvent>) {
        self.push_read(Ok(vec![event.into()]));
    }

    /// Queues a read failure, which drops the connection when consumed.
    pub fn push_read_error(&self, error: TransportError) {
        self.push_read(Err(error));
    }

    /// Makes the next send come back with a not-ok acknowledgment.
    pub fn reject_next_send(&self, error: impl Into<String>) {
        self.state.lock().send_rejections.push_back(error.into());
    }

    fn push_read(&self, read: TransportResult<Vec<RawEvent>>) {
        self.state.lock().reads.push_back(read);
        self.ready.notify_one();
    }

    /// Messages sent so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    /// Number of connect calls, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    /// Tokens passed to connect, in order.
    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().tokens.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Number of queued reads not consumed yet.
    pub fn pending_reads(&self) -> usize {
        self.state.lock().reads.len()
    }
}

#[async_trait]
impl RealtimeSession for MockSession {
    async fn connect(&self, token: &str) -> TransportResult<SessionIdentity> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        state.tokens.push(token.to_string());

        if let Some(error) = state.connect_failures.pop_front() {
            state.connected = false;
            debug!(attempt = state.connect_attempts, error = %error, "Mock connect failed");
            return Err(error);
        }
        if token.is_empty() {
            state.connected = false;
            return Err(TransportError::connection_failed("invalid token"));
        }

        state.connected = true;
        debug!(attempt = state.connect_attempts, "Mock connected");
        Ok(self.identity.clone())
    }

    async fn read_events(&self) -> TransportResult<Vec<RawEvent>> {
        loop {
            {
                let mut state = self.state.lock();
                if !state.connected {
                    return Err(TransportError::NotConnected);
                }
                if let Some(read) = state.reads.pop_front() {
                    if read.is_err() {
                        state.connected = false;
                    }
                    trace!(ok = read.is_ok(), "Mock read");
                    return read;
                }
            }
            self.ready.notified().await;
        }
    }

    async fn send(&self, channel: &str, text: &str, as_self: bool) -> TransportResult<SendAck> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }

        state.sent.push(SentMessage {
            channel: channel.to_string(),
            text: text.to_string(),
            as_self,
        });

        if let Some(error) = state.send_rejections.pop_front() {
            return Ok(SendAck::rejected(error).with_channel(channel));
        }

        state.next_ts += 1;
        let ts = format!("1459618786.{:06}", state.next_ts);
        Ok(SendAck::accepted(ts).with_text(text).with_channel(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_connect_script() {
        let session = MockSession::new();
        session.fail_connect_times(2, "offline");

        assert!(session.connect("xoxb").await.is_err());
        assert!(session.connect("xoxb").await.is_err());
        let identity = session.connect("xoxb").await.unwrap();

        assert_eq!(identity, SessionIdentity::new(MOCK_BOT_ID, MOCK_BOT_NAME));
        assert_eq!(session.connect_attempts(), 3);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_empty_token_is_refused() {
        let session = MockSession::new();
        assert!(matches!(
            session.connect("").await,
            Err(TransportError::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_reads_in_order_and_error_disconnects() {
        let session = MockSession::new();
        session.connect("xoxb").await.unwrap();
        session.push_event(json!({"type": "hello"}));
        session.push_read_error(TransportError::closed("bye"));

        let batch = session.read_events().await.unwrap();
        assert_eq!(batch[0].event_type(), Some("hello"));
        assert!(session.read_events().await.is_err());
        assert!(!session.is_connected());
        assert!(matches!(
            session.read_events().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_waits_for_events() {
        let session = std::sync::Arc::new(MockSession::new());
        session.connect("xoxb").await.unwrap();

        let reader = {
            let session = session.clone();
            tokio::spawn(async move { session.read_events().await })
        };
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert!(!reader.is_finished());

        session.push_event(json!({"type": "message"}));
        let batch = reader.await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_send_records_and_acks() {
        let session = MockSession::new();
        assert!(session.send("C1", "early", true).await.is_err());

        session.connect("xoxb").await.unwrap();
        let ack = session.send("C1", "pong", true).await.unwrap();
        assert!(ack.ok);
        assert_eq!(ack.timestamp.as_deref(), Some("1459618786.000001"));

        session.reject_next_send("channel_not_found");
        let ack = session.send("C404", "hi", true).await.unwrap();
        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("channel_not_found"));

        assert_eq!(
            session.sent(),
            vec![
                SentMessage {
                    channel: "C1".into(),
                    text: "pong".into(),
                    as_self: true
                },
                SentMessage {
                    channel: "C404".into(),
                    text: "hi".into(),
                    as_self: true
                },
            ]
        );
    }
}
