//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use gobble_core::GobbleError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The bot failed to start or send.
    #[error(transparent)]
    Bot(#[from] GobbleError),

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),

    /// The read loop task panicked or was aborted.
    #[error("Read loop task failed: {0}")]
    TaskFailed(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
