//! Gobble Runtime - the connection loop and orchestration layer.
//!
//! This crate provides:
//! - The [`BotController`] read loop with reconnect [`Backoff`]
//! - Runtime orchestration ([`GobbleRuntime`])
//! - Layered configuration (defaults, files, `GOBBLE_*` environment)
//! - Logging configuration
//!
//! ```ignore
//! use gobble_runtime::GobbleRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = GobbleRuntime::builder().registry(registry).build()?;
//!
//!     // Run until Ctrl+C
//!     runtime.run(session).await?;
//!     Ok(())
//! }
//! ```
//!
//! Once connected, the controller never gives up on the session: a lost
//! connection is retried with exponential backoff until shutdown.

pub mod backoff;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use backoff::Backoff;
pub use config::{ConfigError, ConfigLoader, ConfigResult, GobbleConfig, Profile};
pub use controller::{BotController, BotHandle, ControllerBuilder, RunningBot, SessionState};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{GobbleRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
