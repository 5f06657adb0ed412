//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BackoffConfig, GobbleConfig, LogOutput, LoggingConfig};

/// Longest accepted pause between two reads.
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Validates the entire configuration.
///
/// The API token is not required here since it may be supplied
/// programmatically; see [`require_token`].
pub fn validate_config(config: &GobbleConfig) -> ConfigResult<()> {
    if config.poll_interval_ms > MAX_POLL_INTERVAL_MS {
        return Err(ConfigError::validation(format!(
            "Poll interval must be at most {MAX_POLL_INTERVAL_MS} ms, got {}",
            config.poll_interval_ms
        )));
    }

    if let Some(token) = &config.api_token
        && token.trim().is_empty()
    {
        return Err(ConfigError::validation("API token must not be blank"));
    }

    if config.aliases.iter().any(|alias| alias.trim().is_empty()) {
        return Err(ConfigError::validation("Aliases must not be blank"));
    }

    validate_backoff(&config.backoff)?;
    validate_logging(&config.logging)?;
    Ok(())
}

/// Returns the API token, failing when it is missing or blank.
pub fn require_token(config: &GobbleConfig) -> ConfigResult<&str> {
    config
        .token()
        .ok_or_else(|| ConfigError::missing_field("api_token"))
}

fn validate_backoff(backoff: &BackoffConfig) -> ConfigResult<()> {
    if backoff.max_delay_secs == 0 {
        return Err(ConfigError::validation(
            "Max reconnect delay must be greater than 0",
        ));
    }
    if backoff.jitter_ms > backoff.max_delay_secs.saturating_mul(1000) {
        return Err(ConfigError::validation(
            "Reconnect jitter must not exceed the max reconnect delay",
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if logging.filters.keys().any(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation("Log filter module must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GobbleConfig {
        GobbleConfig {
            api_token: Some("xoxb-test".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&GobbleConfig::default()).is_ok());
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_blank_token() {
        let config = GobbleConfig {
            api_token: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
        assert!(matches!(
            require_token(&config),
            Err(ConfigError::MissingField { field }) if field == "api_token"
        ));
    }

    #[test]
    fn test_require_token() {
        assert_eq!(require_token(&valid()).unwrap(), "xoxb-test");
        assert!(require_token(&GobbleConfig::default()).is_err());
    }

    #[test]
    fn test_poll_interval_bound() {
        let mut config = valid();
        config.poll_interval_ms = MAX_POLL_INTERVAL_MS + 1;
        assert!(validate_config(&config).is_err());
        config.poll_interval_ms = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = valid();
        config.backoff.max_delay_secs = 0;
        assert!(validate_config(&config).is_err());

        config.backoff.max_delay_secs = 1;
        config.backoff.jitter_ms = 1001;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some("gobble.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_blank_alias() {
        let mut config = valid();
        config.aliases = vec!["normandy".into(), " ".into()];
        assert!(validate_config(&config).is_err());
    }
}
