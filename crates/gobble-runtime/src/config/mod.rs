//! Configuration for the Gobble runtime.
//!
//! Settings are layered from defaults, TOML/YAML files and `GOBBLE_*`
//! environment variables by [`ConfigLoader`], then checked by
//! [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, Profile, load_config, load_config_from_file};
pub use schema::{
    BackoffConfig, GobbleConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
};
pub use validation::{MAX_POLL_INTERVAL_MS, require_token, validate_config};
