use thiserror::Error;

use crate::config::Config;
use crate::rate_limit_config::RateLimitParseError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT must be greater than 0")]
    ZeroPort,
    #[error("ALLOWED_TOKENS contains no usable token")]
    NoTokens,
    #[error("invalid rate limit in {var}: {source}")]
    RateLimit {
        var: &'static str,
        source: RateLimitParseError,
    },
    #[error("NOTIFY_TIMEOUT_SECS must be greater than 0")]
    ZeroTimeout,
    #[error("NOTIFY_WEBHOOK_URL must start with 'http://' or 'https://'")]
    WebhookScheme,
}

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.port == 0 {
            return Err(ConfigError::ZeroPort);
        }

        if config.allowed_tokens().is_empty() {
            return Err(ConfigError::NoTokens);
        }

        Self::validate_rate_limit("RATE_LIMIT_DEFAULT", &config.rate_limit_default)?;
        Self::validate_rate_limit("RATE_LIMIT_SEND", &config.rate_limit_send)?;

        if config.notify_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if let Some(url) = &config.notify_webhook_url {
            Self::validate_webhook_url(url)?;
        }

        Ok(())
    }

    pub fn validate_rate_limit(var: &'static str, value: &str) -> Result<(), ConfigError> {
        crate::rate_limit_config::parse_tiers(value)
            .map(|_| ())
            .map_err(|source| ConfigError::RateLimit { var, source })
    }

    pub fn validate_webhook_url(url: &str) -> Result<(), ConfigError> {
        let url = url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::WebhookScheme);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigValidator::validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_port() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        assert!(matches!(ConfigValidator::validate(&config), Err(ConfigError::ZeroPort)));
    }

    #[test]
    fn test_blank_tokens() {
        let config = Config {
            allowed_tokens: " , ,".to_string(),
            ..Config::default()
        };
        assert!(matches!(ConfigValidator::validate(&config), Err(ConfigError::NoTokens)));
    }

    #[test]
    fn test_bad_rate_limit() {
        let config = Config {
            rate_limit_send: "lots per minute".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigError::RateLimit { var: "RATE_LIMIT_SEND", .. })
        ));
    }

    #[test]
    fn test_zero_timeout() {
        let config = Config {
            notify_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(ConfigValidator::validate(&config), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_webhook_url() {
        assert!(ConfigValidator::validate_webhook_url("https://hooks.example.com/a").is_ok());
        assert!(ConfigValidator::validate_webhook_url("http://10.0.0.2:8080/notify").is_ok());
        assert!(ConfigValidator::validate_webhook_url("ftp://example.com").is_err());
        assert!(ConfigValidator::validate_webhook_url("").is_err());
    }
}
