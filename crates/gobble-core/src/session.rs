//! The realtime session capability.
//!
//! A [`RealtimeSession`] is the only thing the runtime knows about the
//! messaging backend. Implementations live in `gobble-transport`: a live
//! session speaking to the backend and a scripted double for tests.
//!
//! All methods take `&self` so a single session can be shared between the
//! read loop and handlers sending replies. Implementations synchronize
//! internally.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportResult;
use crate::event::RawEvent;

/// Identity of the bot user, as reported by the backend at connect time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Bot user id (e.g. `UJFIDFJDFAKE`).
    pub id: String,
    /// Bot display name (e.g. `edi`).
    pub name: String,
}

impl SessionIdentity {
    /// Creates a new identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Acknowledgment returned by the backend for a sent message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SendAck {
    /// Whether the backend accepted the message.
    pub ok: bool,
    /// Backend timestamp of the posted message.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// The text as echoed back by the backend.
    #[serde(default)]
    pub text: Option<String>,
    /// Channel the message was posted to.
    #[serde(default)]
    pub channel: Option<String>,
    /// Backend error code when `ok` is false.
    #[serde(default)]
    pub error: Option<String>,
}

impl SendAck {
    /// Creates a successful acknowledgment.
    pub fn accepted(timestamp: impl Into<String>) -> Self {
        Self {
            ok: true,
            timestamp: Some(timestamp.into()),
            ..Default::default()
        }
    }

    /// Creates a rejected acknowledgment.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Sets the echoed text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the channel.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

/// A persistent realtime connection to the messaging backend.
#[async_trait]
pub trait RealtimeSession: Send + Sync {
    /// Opens (or re-opens) the session with the given API token.
    ///
    /// Returns the bot identity on success. Calling `connect` on an already
    /// connected session replaces the underlying connection.
    async fn connect(&self, token: &str) -> TransportResult<SessionIdentity>;

    /// Reads the next batch of events.
    ///
    /// May wait for events to arrive; an empty batch is a valid result.
    /// An error means the connection is lost.
    async fn read_events(&self) -> TransportResult<Vec<RawEvent>>;

    /// Posts `text` to `channel`, as the bot user when `as_self` is set.
    async fn send(&self, channel: &str, text: &str, as_self: bool) -> TransportResult<SendAck>;
}

/// Shared, type-erased session.
pub type BoxedSession = Arc<dyn RealtimeSession>;
