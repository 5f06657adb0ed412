//! Unified error types for the Gobble runtime.
//!
//! Transport-level failures are reported as [`TransportError`] by
//! [`RealtimeSession`](crate::RealtimeSession) implementations. Everything the
//! controller, registry or message model can fail with is a [`GobbleError`].

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed by the remote side.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Reading events failed.
    #[error("failed to read events: {0}")]
    ReadFailed(String),

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// The backend answered with something we could not understand.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session is not connected.
    #[error("session is not connected")]
    NotConnected,
}

impl TransportError {
    /// Creates a connection failure.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Creates a connection-closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

// =============================================================================
// Bot Errors
// =============================================================================

/// Errors surfaced by the bot runtime.
#[derive(Debug, Clone, Error)]
pub enum GobbleError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The transport could not connect.
    #[error("connection error: {0}")]
    Connection(#[source] TransportError),

    /// Reading from an established session failed.
    #[error("transport read error: {0}")]
    TransportRead(#[source] TransportError),

    /// Sending through the transport failed.
    #[error("send error: {0}")]
    Send(#[source] TransportError),

    /// The message was already sent and must not be sent again.
    #[error("message already sent")]
    AlreadySent,

    /// The message already carries a response.
    #[error("message already has a response")]
    AlreadyResponded,

    /// A handler failed while processing an event.
    #[error("handler '{handler}' failed: {reason}")]
    Dispatch {
        /// Name or pattern of the failing handler.
        handler: String,
        /// Reason for failure.
        reason: String,
    },

    /// The message is not attached to a running bot.
    #[error("message is not attached to a connected bot")]
    NotConnected,

    /// A raw event is missing fields required to build a message.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A handler pattern failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern source.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
}

impl GobbleError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a malformed-event error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEvent(msg.into())
    }

    /// Creates a dispatch error.
    pub fn dispatch(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dispatch {
            handler: handler.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for bot operations.
pub type GobbleResult<T> = Result<T, GobbleError>;
