use envconfig::Envconfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::auth::{AllowedTokens, DEFAULT_ALLOWED_TOKENS};
use crate::rate_limit_config::{
    parse_tiers, RateLimitConfig, RateLimitParseError, DEFAULT_GLOBAL_LIMITS, DEFAULT_SEND_LIMITS,
    SEND_ROUTE,
};

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Comma-separated list of accepted tokens
    #[envconfig(from = "ALLOWED_TOKENS", default = "aAr#th;}11t.M^1SU8~6)R)71YTh9jsE")]
    pub allowed_tokens: String,

    /// Listening port; the host is always 0.0.0.0
    #[envconfig(from = "PORT", default = "9700")]
    pub port: u16,

    /// Debug mode, accepts true/1/yes
    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: String,

    /// Global rate limits, e.g. "10 per minute;1 per second"
    #[envconfig(from = "RATE_LIMIT_DEFAULT", default = "10 per minute;1 per second")]
    pub rate_limit_default: String,

    /// Extra limits for the send route
    #[envconfig(from = "RATE_LIMIT_SEND", default = "5 per minute;1 per second")]
    pub rate_limit_send: String,

    /// Minimum seconds between sweeps of idle rate limit entries
    #[envconfig(from = "RATE_LIMIT_CLEANUP_SECS", default = "60")]
    pub rate_limit_cleanup_secs: u64,

    /// Take client identity from X-Forwarded-For / X-Real-IP
    #[envconfig(from = "TRUST_PROXY_HEADERS", default = "false")]
    pub trust_proxy_headers: String,

    /// Webhook receiving notifications; unset means log-only delivery
    #[envconfig(from = "NOTIFY_WEBHOOK_URL")]
    pub notify_webhook_url: Option<String>,

    /// Upper bound on one delivery attempt
    #[envconfig(from = "NOTIFY_TIMEOUT_SECS", default = "10")]
    pub notify_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn debug_enabled(&self) -> bool {
        parse_flag(&self.debug)
    }

    pub fn trust_proxy_headers(&self) -> bool {
        parse_flag(&self.trust_proxy_headers)
    }

    pub fn allowed_tokens(&self) -> AllowedTokens {
        AllowedTokens::from_csv(&self.allowed_tokens)
    }

    pub fn uses_default_token(&self) -> bool {
        self.allowed_tokens.trim() == DEFAULT_ALLOWED_TOKENS
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn rate_limits(&self) -> Result<RateLimitConfig, RateLimitParseError> {
        let global = parse_tiers(&self.rate_limit_default)?;
        let send = parse_tiers(&self.rate_limit_send)?;

        let mut limits = RateLimitConfig::global_only(global).with_route(SEND_ROUTE, send);
        limits.cleanup_interval = Duration::from_secs(self.rate_limit_cleanup_secs);
        Ok(limits)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_tokens: DEFAULT_ALLOWED_TOKENS.to_string(),
            port: 9700,
            debug: "false".to_string(),
            rate_limit_default: DEFAULT_GLOBAL_LIMITS.to_string(),
            rate_limit_send: DEFAULT_SEND_LIMITS.to_string(),
            rate_limit_cleanup_secs: 60,
            trust_proxy_headers: "false".to_string(),
            notify_webhook_url: None,
            notify_timeout_secs: 10,
        }
    }
}

/// Boolean-like environment value: true, 1 and yes enable, anything else disables.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_env() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();

        assert_eq!(config.port, 9700);
        assert!(!config.debug_enabled());
        assert!(!config.trust_proxy_headers());
        assert!(config.uses_default_token());
        assert!(config.notify_webhook_url.is_none());
        assert_eq!(config.notify_timeout(), Duration::from_secs(10));
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:9700");
    }

    #[test]
    fn test_default_matches_env_defaults() {
        let from_env = Config::init_from_hashmap(&HashMap::new()).unwrap();
        let default = Config::default();
        assert_eq!(from_env.allowed_tokens, default.allowed_tokens);
        assert_eq!(from_env.rate_limit_default, default.rate_limit_default);
        assert_eq!(from_env.rate_limit_send, default.rate_limit_send);
    }

    #[test]
    fn test_overrides() {
        let config = Config::init_from_hashmap(&env(&[
            ("ALLOWED_TOKENS", "one, two"),
            ("PORT", "8080"),
            ("DEBUG", "Yes"),
            ("NOTIFY_WEBHOOK_URL", "https://hooks.example.com/x"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert!(config.debug_enabled());
        assert!(!config.uses_default_token());
        assert!(config.allowed_tokens().is_authorized("two"));
        assert_eq!(config.notify_webhook_url.as_deref(), Some("https://hooks.example.com/x"));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Config::init_from_hashmap(&env(&[("PORT", "http")])).is_err());
    }

    #[test]
    fn test_rate_limits_from_env() {
        let config = Config::init_from_hashmap(&env(&[
            ("RATE_LIMIT_DEFAULT", "100 per hour"),
            ("RATE_LIMIT_SEND", "2/minute"),
            ("RATE_LIMIT_CLEANUP_SECS", "5"),
        ]))
        .unwrap();

        let limits = config.rate_limits().unwrap();
        assert_eq!(limits.global.len(), 1);
        assert_eq!(limits.route_tiers(SEND_ROUTE).len(), 1);
        assert_eq!(limits.cleanup_interval, Duration::from_secs(5));
        assert_eq!(limits.longest_window(), Duration::from_secs(3_600));
    }

    #[test]
    fn test_parse_flag() {
        for on in ["true", "TRUE", "1", "yes", " Yes "] {
            assert!(parse_flag(on), "{on}");
        }
        for off in ["false", "0", "no", "", "on"] {
            assert!(!parse_flag(off), "{off}");
        }
    }
}
