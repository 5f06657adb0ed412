//! # Gobble Transport
//!
//! [`RealtimeSession`](gobble_core::RealtimeSession) implementations for the
//! Gobble bot runtime.
//!
//! ## Features
//!
//! - `rtm`: live Slack-style RTM session ([`SlackRtmSession`]), built on
//!   reqwest for the Web API and tokio-tungstenite for the event socket
//!
//! The scripted [`MockSession`] is always available.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  gobble-runtime     │  (controller, read loop)
//! ├─────────────────────┤
//! │  gobble-core        │  (RealtimeSession trait)
//! ├─────────────────────┤
//! │  gobble-transport   │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (HTTP/WS)  │
//! └─────────────────────┘
//! ```

pub mod mock;

#[cfg(feature = "rtm")]
pub mod rtm;

pub use mock::{MOCK_BOT_ID, MOCK_BOT_NAME, MockSession, SentMessage};

#[cfg(feature = "rtm")]
pub use rtm::{DEFAULT_API_BASE, SlackRtmSession};
