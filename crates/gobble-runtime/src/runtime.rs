//! Runtime orchestration: configuration, logging and the bot lifecycle.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gobble_runtime::GobbleRuntime;
//!
//! // Searches gobble.toml in the current directory, then applies GOBBLE_* env vars
//! let runtime = GobbleRuntime::builder()
//!     .registry(registry)
//!     .build()?;
//! runtime.run(session).await?;
//!
//! // Or from a pre-loaded config
//! let config = load_config_from_file("bot.toml")?;
//! let runtime = GobbleRuntime::from_config(&config).with_registry(registry);
//! ```

use std::future::Future;
use std::path::Path;

use tokio::signal;
use tracing::{debug, info};

use crate::config::{ConfigLoader, ConfigResult, GobbleConfig, validate_config};
use crate::controller::{BotController, RunningBot};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use gobble_core::BoxedSession;
use gobble_framework::HandlerRegistry;

/// Ties configuration and a handler registry to a session.
pub struct GobbleRuntime {
    config: GobbleConfig,
    registry: HandlerRegistry,
}

impl GobbleRuntime {
    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from loaded configuration and initializes logging.
    pub fn from_config(config: &GobbleConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            poll_interval_ms = config.poll_interval_ms,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            registry: HandlerRegistry::empty(),
        }
    }

    /// Replaces the handler registry.
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &GobbleConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Builds a controller for `session` from this runtime's settings.
    pub fn controller(&self, session: BoxedSession) -> BotController {
        BotController::from_config(session, &self.config, self.registry.clone())
    }

    /// Connects and starts the read loop in the background.
    pub async fn start(&self, session: BoxedSession) -> RuntimeResult<RunningBot> {
        debug!(routes = self.registry.len(), "Starting bot");
        Ok(self.controller(session).initialize().await?)
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self, session: BoxedSession) -> RuntimeResult<()> {
        let bot = self.start(session).await?;
        info!("Gobble is now running. Press Ctrl+C to stop.");

        let received = wait_for_shutdown().await;
        let stopped = bot.shutdown().await;
        info!("Runtime stopped");
        received.and(stopped)
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, session: BoxedSession, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let bot = self.start(session).await?;
        shutdown.await;
        bot.shutdown().await?;
        info!("Runtime stopped");
        Ok(())
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`GobbleRuntime`] with custom configuration sources.
///
/// ```rust,ignore
/// let runtime = GobbleRuntime::builder()
///     .config_file("config/bot.toml")
///     .profile("production")
///     .token(std::env::var("SLACK_TOKEN")?)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    registry: HandlerRegistry,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            registry: HandlerRegistry::empty(),
        }
    }

    /// Loads this file instead of searching.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Sets the API token, overriding every other source.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.set("api_token", token.into());
        self
    }

    /// Merges a whole configuration over every other source.
    pub fn merge(mut self, config: GobbleConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Loads and validates the configuration, then builds the runtime.
    pub fn build(self) -> ConfigResult<GobbleRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        Ok(GobbleRuntime::from_config(&config).with_registry(self.registry))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::ConfigError;
    use gobble_core::{GobbleError, Message};
    use gobble_framework::Captures;
    use gobble_transport::{MockSession, SentMessage};
    use serde_json::json;
    use tempfile::TempDir;

    fn pong() -> HandlerRegistry {
        HandlerRegistry::builder()
            .listen("ping", |mut message: Message, _captures: Captures| async move {
                message.reply("pong").await?;
                Ok::<_, anyhow::Error>(())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_reads_file_and_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot.toml");
        fs::write(&path, "poll_interval_ms = 25\naliases = [\"normandy\"]\n").unwrap();

        let runtime = GobbleRuntime::builder()
            .without_env()
            .config_file(&path)
            .token("xoxb-file")
            .registry(pong())
            .build()
            .unwrap();

        assert_eq!(runtime.config().poll_interval_ms, 25);
        assert_eq!(runtime.config().aliases, vec!["normandy"]);
        assert_eq!(runtime.config().token(), Some("xoxb-file"));
        assert_eq!(runtime.registry().len(), 1);
    }

    #[test]
    fn test_builder_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot.toml");
        fs::write(&path, "[backoff]\nmax_delay_secs = 0\n").unwrap();

        let result = GobbleRuntime::builder()
            .without_env()
            .config_file(&path)
            .build();
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn test_start_without_token() {
        let runtime = GobbleRuntime::from_config(&GobbleConfig::default());
        let result = runtime.start(Arc::new(MockSession::new())).await;
        assert!(matches!(
            result,
            Err(RuntimeError::Bot(GobbleError::Configuration(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until() {
        let config = GobbleConfig {
            api_token: Some("xoxb".into()),
            ..Default::default()
        };
        let runtime = GobbleRuntime::from_config(&config).with_registry(pong());
        let session = Arc::new(MockSession::new());
        session.push_event(json!({
            "type": "message", "user": "U7", "text": "edi ping", "channel": "D1"
        }));

        runtime
            .run_until(
                session.clone(),
                tokio::time::sleep(Duration::from_millis(100)),
            )
            .await
            .unwrap();

        assert_eq!(
            session.sent(),
            vec![SentMessage {
                channel: "D1".into(),
                text: "<@U7> pong".into(),
                as_self: true,
            }]
        );
    }
}
