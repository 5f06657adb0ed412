//! Normalized chat messages.
//!
//! A [`Message`] is either built from an inbound [`RawEvent`] or created
//! empty as an outbound message by [`Message::reply`], [`Message::respond`]
//! or [`Message::outbound`]. Inbound messages carry a handle to the bot that
//! received them so handlers can answer without reaching for global state.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::{GobbleError, GobbleResult};
use crate::event::RawEvent;
use crate::session::{SendAck, SessionIdentity};
use crate::text::strip_prefix_ignore_case;

/// Something that can deliver a [`Message`] to the backend.
///
/// Implemented by the runtime's bot handle. `send_message` must refuse
/// messages that are already sent and mark the message as sent on success.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends the message, updating its `sent` state.
    async fn send_message(&self, message: &mut Message) -> GobbleResult<SendAck>;
}

/// Shared, type-erased sender.
pub type BoxedSender = Arc<dyn MessageSender>;

/// A chat message.
#[derive(Clone, Default)]
pub struct Message {
    raw_text: String,
    text: String,
    sender: Option<String>,
    channel: String,
    team: Option<String>,
    timestamp: Option<String>,
    sent: bool,
    response: Option<Box<Message>>,
    bot: Option<BoxedSender>,
}

impl Message {
    /// Builds an inbound message from a raw event.
    ///
    /// The leading trigger (`"<bot name> "` or `<@bot id>`) is stripped from
    /// [`text`](Self::text); [`raw_text`](Self::raw_text) keeps the original.
    /// A message carrying a backend timestamp is considered sent.
    pub fn from_event(event: &RawEvent, identity: &SessionIdentity) -> GobbleResult<Self> {
        let sender = event
            .user()
            .ok_or_else(|| GobbleError::malformed("message event has no user"))?;
        let channel = event
            .channel()
            .ok_or_else(|| GobbleError::malformed("message event has no channel"))?;
        let raw_text = event
            .text()
            .ok_or_else(|| GobbleError::malformed("message event has no text"))?;

        let timestamp = event.timestamp();
        Ok(Self {
            text: strip_trigger(raw_text, identity).to_string(),
            raw_text: raw_text.to_string(),
            sender: Some(sender.to_string()),
            channel: channel.to_string(),
            team: event.team().map(str::to_string),
            sent: timestamp.is_some(),
            timestamp,
            response: None,
            bot: None,
        })
    }

    /// Builds an inbound message from the JSON string form of an event.
    pub fn from_json(raw: &str, identity: &SessionIdentity) -> GobbleResult<Self> {
        Self::from_event(&RawEvent::from_json(raw)?, identity)
    }

    /// Creates an unsent outbound message.
    pub fn outbound(channel: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw_text: text.clone(),
            text,
            channel: channel.into(),
            ..Default::default()
        }
    }

    /// Attaches the bot that will deliver replies to this message.
    pub fn with_sender(mut self, bot: BoxedSender) -> Self {
        self.bot = Some(bot);
        self
    }

    /// The text as received, including any trigger.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// The text with the bot trigger removed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Id of the user who sent the message. `None` for outbound messages.
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Channel id.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Team id, if the backend reported one.
    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    /// Backend timestamp. Present once the message has been sent.
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    /// Whether the message has been sent.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// The response created by [`reply`](Self::reply) or
    /// [`respond`](Self::respond), if any.
    pub fn response(&self) -> Option<&Message> {
        self.response.as_deref()
    }

    /// Records a successful delivery.
    pub fn mark_sent(&mut self, timestamp: Option<String>) {
        self.timestamp = timestamp;
        self.sent = true;
    }

    /// At-mentions the original sender in a new message to the same channel.
    pub async fn reply(&mut self, text: impl AsRef<str>) -> GobbleResult<SendAck> {
        let sender = self.sender.as_deref().unwrap_or_default();
        let text = format!("<@{}> {}", sender, text.as_ref());
        self.respond(text).await
    }

    /// Sends a new message from the bot to the same channel.
    pub async fn respond(&mut self, text: impl Into<String>) -> GobbleResult<SendAck> {
        if self.response.is_some() {
            return Err(GobbleError::AlreadyResponded);
        }
        let bot = self.bot.clone().ok_or(GobbleError::NotConnected)?;

        let mut response = Message::outbound(self.channel.clone(), text).with_sender(bot.clone());
        trace!(channel = %self.channel, in_reply_to = ?self.timestamp, "Sending response");
        let result = bot.send_message(&mut response).await;
        if let Err(e) = &result {
            debug!(channel = %self.channel, error = %e, "Response was not sent");
        }
        self.response = Some(Box::new(response));
        result
    }

    /// Sends this message through the attached bot.
    pub async fn send(&mut self) -> GobbleResult<SendAck> {
        let bot = self.bot.clone().ok_or(GobbleError::NotConnected)?;
        bot.send_message(self).await
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("raw_text", &self.raw_text)
            .field("text", &self.text)
            .field("sender", &self.sender)
            .field("channel", &self.channel)
            .field("team", &self.team)
            .field("timestamp", &self.timestamp)
            .field("sent", &self.sent)
            .field("response", &self.response)
            .finish()
    }
}

/// Removes a leading `"<name> "` or `<@id>` trigger.
fn strip_trigger<'a>(text: &'a str, identity: &SessionIdentity) -> &'a str {
    if let Some(rest) = strip_prefix_ignore_case(text, &format!("{} ", identity.name)) {
        return rest;
    }
    if let Some(rest) = strip_prefix_ignore_case(text, &format!("<@{}>", identity.id)) {
        return rest.trim_start_matches([':', ',']).trim_start();
    }
    text
}
