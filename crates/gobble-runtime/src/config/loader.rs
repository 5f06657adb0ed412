//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`gobble.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`gobble.yaml`, `gobble.yml`, ...)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`gobble.{profile}.toml` / `gobble.{profile}.yaml`)
//! 3. Main config file (`gobble.toml` / `gobble.yaml`)
//! 4. Environment variables (`GOBBLE_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `GOBBLE_` prefix with `__` as the nesting
//! separator:
//!
//! - `GOBBLE_API_TOKEN=xoxb-...` → `api_token`
//! - `GOBBLE_POLL_INTERVAL_MS=5` → `poll_interval_ms = 5`
//! - `GOBBLE_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `GOBBLE_BACKOFF__MAX_DELAY_SECS=60` → `backoff.max_delay_secs = 60`
//!
//! ```rust,ignore
//! use gobble_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .file("./config/gobble.toml")
//!     .set("aliases", ["normandy"])
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::GobbleConfig;

/// Prefix of environment variables read by the loader.
pub const ENV_PREFIX: &str = "GOBBLE_";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the `dev`/`prod` short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `GOBBLE_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("GOBBLE_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides, merged last.
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the user config directory (`~/.config/gobble` on Linux).
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("gobble"))
        } else {
            self
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Overrides a single key, e.g. `set("logging.level", "debug")`.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Merges a whole configuration over every other source.
    pub fn merge(mut self, config: GobbleConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<GobbleConfig> {
        let profile = self.profile.clone();
        let config: GobbleConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            has_token = config.token().is_some(),
            aliases = config.aliases.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(GobbleConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(std::mem::take(&mut self.overrides)))
    }

    /// Merges a single config file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("gobble"));
        }
        paths
    }

    /// Looks for `base_names` in every search path; the first base file found
    /// wins, with its profile-specific sibling merged underneath.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn find_files(&self, search_paths: &[PathBuf], base_names: &[&str]) -> Vec<PathBuf> {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };
                let base_path = search_path.join(base_name);
                if !base_path.exists() {
                    continue;
                }

                let mut found = Vec::new();
                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    found.push(profile_path);
                }
                info!(path = %base_path.display(), "Loading configuration file");
                found.push(base_path);
                return found;
            }
        }
        Vec::new()
    }

    fn load_config_files(&self, mut figment: Figment) -> Figment {
        #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        for path in self.find_files(&search_paths, &["gobble.toml", "config.toml"]) {
            figment = figment.merge(Toml::file(path));
            found = true;
        }

        #[cfg(feature = "yaml-config")]
        for path in self.find_files(
            &search_paths,
            &["gobble.yaml", "gobble.yml", "config.yaml", "config.yml"],
        ) {
            figment = figment.merge(Yaml::file(path));
            found = true;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<GobbleConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file plus environment variables.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<GobbleConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogLevel, validate_config};
    use std::fs;
    use tempfile::TempDir;

    fn isolated() -> (TempDir, ConfigLoader) {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new().without_env().search_path(dir.path());
        (dir, loader)
    }

    #[test]
    fn test_default_config() {
        let (_dir, loader) = isolated();
        let config = loader.load().unwrap();

        assert_eq!(config, GobbleConfig::default());
        assert_eq!(config.poll_interval_ms, 1);
        assert_eq!(config.backoff.max_delay_secs, 300);
        assert_eq!(config.logging.level.as_str(), "info");
        assert!(config.token().is_none());
    }

    #[test]
    fn test_missing_file() {
        let (dir, loader) = isolated();
        let result = loader.file(dir.path().join("nope.toml")).load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let (dir, loader) = isolated();
        let path = dir.path().join("gobble.ini");
        fs::write(&path, "api_token = x").unwrap();
        assert!(matches!(
            loader.file(path).load(),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn test_overrides_win() {
        let (_dir, loader) = isolated();
        let config = loader
            .set("api_token", "xoxb-override")
            .set("logging.level", "debug")
            .load()
            .unwrap();
        assert_eq!(config.token(), Some("xoxb-override"));
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_and_profile() {
        let (dir, loader) = isolated();
        fs::write(
            dir.path().join("gobble.toml"),
            r#"
api_token = "xoxb-file"
aliases = ["normandy", "joker"]

[backoff]
max_delay_secs = 60
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("gobble.production.toml"),
            "poll_interval_ms = 50\napi_token = \"xoxb-profile\"\n",
        )
        .unwrap();

        let config = loader.profile("prod").load().unwrap();
        // The main file is merged over its profile sibling.
        assert_eq!(config.token(), Some("xoxb-file"));
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.aliases, vec!["normandy", "joker"]);
        assert_eq!(config.backoff.max_delay_secs, 60);
        assert_eq!(config.backoff.jitter_ms, 1000);
        assert!(validate_config(&config).is_ok());
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_invalid_value_is_parse_error() {
        let (dir, loader) = isolated();
        let path = dir.path().join("gobble.toml");
        fs::write(&path, "poll_interval_ms = \"often\"\n").unwrap();
        assert!(matches!(
            loader.file(path).load(),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }
}
