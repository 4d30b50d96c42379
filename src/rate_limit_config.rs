use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Scope name for tiers that apply to every rate-limited route.
pub const GLOBAL_SCOPE: &str = "global";

/// Route key of the send endpoint.
pub const SEND_ROUTE: &str = "send";

pub const DEFAULT_GLOBAL_LIMITS: &str = "10 per minute;1 per second";
pub const DEFAULT_SEND_LIMITS: &str = "5 per minute;1 per second";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitParseError {
    #[error("empty rate limit expression")]
    Empty,
    #[error("invalid rate limit expression '{0}'")]
    Syntax(String),
    #[error("unknown time unit '{0}'")]
    Unit(String),
    #[error("rate limit '{0}' must have a non-zero count and window")]
    Zero(String),
}

/// One limit rule: at most `limit` requests in any rolling `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateTier {
    pub limit: u32,
    pub window: Duration,
}

impl RateTier {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }
}

impl fmt::Display for RateTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {}s", self.limit, self.window.as_secs())
    }
}

impl FromStr for RateTier {
    type Err = RateLimitParseError;

    /// Accepts `10 per minute`, `5 per 30 seconds` and `1/second`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expr = s.trim();
        if expr.is_empty() {
            return Err(RateLimitParseError::Empty);
        }

        let lowered = expr.to_lowercase();
        let (count, period) = lowered
            .split_once('/')
            .or_else(|| lowered.split_once(" per "))
            .ok_or_else(|| RateLimitParseError::Syntax(expr.to_string()))?;

        let limit: u32 = count
            .trim()
            .parse()
            .map_err(|_| RateLimitParseError::Syntax(expr.to_string()))?;

        let mut parts = period.split_whitespace();
        let (multiplier, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(unit), None, None) => (1u64, unit),
            (Some(n), Some(unit), None) => {
                let n = n
                    .parse()
                    .map_err(|_| RateLimitParseError::Syntax(expr.to_string()))?;
                (n, unit)
            }
            _ => return Err(RateLimitParseError::Syntax(expr.to_string())),
        };

        let unit_secs = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3_600,
            "day" => 86_400,
            _ => return Err(RateLimitParseError::Unit(unit.to_string())),
        };

        if limit == 0 || multiplier == 0 {
            return Err(RateLimitParseError::Zero(expr.to_string()));
        }

        let window_secs = multiplier
            .checked_mul(unit_secs)
            .ok_or_else(|| RateLimitParseError::Syntax(expr.to_string()))?;

        Ok(RateTier::new(limit, Duration::from_secs(window_secs)))
    }
}

/// Parse a `;` or `,` separated list of tiers.
pub fn parse_tiers(s: &str) -> Result<Vec<RateTier>, RateLimitParseError> {
    let tiers = s
        .split([';', ','])
        .filter(|part| !part.trim().is_empty())
        .map(str::parse::<RateTier>)
        .collect::<Result<Vec<_>, _>>()?;

    if tiers.is_empty() {
        return Err(RateLimitParseError::Empty);
    }
    Ok(tiers)
}

/// Tier layout for the limiter: global tiers plus extra tiers per route.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub global: Vec<RateTier>,
    pub routes: HashMap<String, Vec<RateTier>>,
    pub cleanup_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut routes = HashMap::new();
        routes.insert(
            SEND_ROUTE.to_string(),
            vec![RateTier::per_minute(5), RateTier::per_second(1)],
        );

        Self {
            global: vec![RateTier::per_minute(10), RateTier::per_second(1)],
            routes,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Config with only global tiers.
    pub fn global_only(global: Vec<RateTier>) -> Self {
        Self {
            global,
            routes: HashMap::new(),
            cleanup_interval: Duration::from_secs(60),
        }
    }

    pub fn with_route(mut self, route: impl Into<String>, tiers: Vec<RateTier>) -> Self {
        self.routes.insert(route.into(), tiers);
        self
    }

    pub fn route_tiers(&self, route: &str) -> &[RateTier] {
        self.routes.get(route).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Longest window across all tiers; state idle for longer than this is stale.
    pub fn longest_window(&self) -> Duration {
        self.global
            .iter()
            .chain(self.routes.values().flatten())
            .map(|tier| tier.window)
            .max()
            .unwrap_or_default()
    }
}
