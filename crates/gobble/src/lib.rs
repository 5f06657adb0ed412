//! # Gobble
//!
//! A realtime chat bot runtime: keep one session alive, filter what is
//! addressed to the bot, route it to regex handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐  RawEvent  ┌──────────────────┐  Message  ┌─────────────────┐
//! │ RealtimeSession │───────────▶│  BotController   │──────────▶│ HandlerRegistry │
//! │ (mock, rtm)     │            │ filter + backoff │           │ first match...  │
//! └─────────────────┘◀───────────└──────────────────┘◀──────────└─────────────────┘
//!                       send                           reply / respond
//! ```
//!
//! - **Sessions**: connect, read batches of events, send text
//! - **Controller**: reconnects with exponential backoff and jitter
//! - **Filter**: drops hidden and self-authored events, keeps addressed ones
//! - **Registry**: every handler whose pattern matches the start of the text runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gobble::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = HandlerRegistry::builder()
//!         .listen("ping", |mut message: Message, _: Captures| async move {
//!             message.respond("pong").await?;
//!             Ok(())
//!         })
//!         .build()?;
//!
//!     let runtime = GobbleRuntime::builder().registry(registry).build()?;
//!     runtime.run(Arc::new(MockSession::new())).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default), `yaml-config`: config file formats
//! - `json-log`: JSON log lines
//! - `builtin-handlers`: the stock greeting handlers
//! - `rtm`: the Slack RTM session

pub use gobble_core as core;
pub use gobble_framework as framework;
pub use gobble_runtime as runtime;
pub use gobble_transport as transport;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use gobble::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime
    pub use gobble_runtime::{
        Backoff, BotController, BotHandle, GobbleConfig, GobbleRuntime, RunningBot, SessionState,
    };

    // Routing
    pub use gobble_framework::{
        Captures, HandlerRegistry, HandlerResult, MessageFilter, Pattern, PatternOptions,
        RegistryBuilder, Verdict,
    };

    #[cfg(feature = "builtin-handlers")]
    pub use gobble_framework::builtin;

    // Messages and sessions
    pub use gobble_core::{
        GobbleError, GobbleResult, Message, RawEvent, RealtimeSession, SendAck, SessionIdentity,
    };
    pub use gobble_transport::MockSession;

    #[cfg(feature = "rtm")]
    pub use gobble_transport::SlackRtmSession;

    pub use gobble_runtime::prelude::*;
}
