use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::GatewayError;
use crate::rate_limit_config::{RateLimitConfig, RateTier, GLOBAL_SCOPE};

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied {
        scope: String,
        tier: RateTier,
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Sliding-window log for one tier. Never holds more than `limit` entries.
#[derive(Debug, Default)]
struct WindowLog {
    hits: VecDeque<Instant>,
}

impl WindowLog {
    fn prune(&mut self, window: Duration, now: Instant) {
        while let Some(&oldest) = self.hits.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the oldest hit leaves the window, or `None` if there is room.
    fn wait_time(&self, tier: &RateTier, now: Instant) -> Option<Duration> {
        if self.hits.len() < tier.limit as usize {
            return None;
        }
        let oldest = self.hits.front().copied().unwrap_or(now);
        Some(tier.window.saturating_sub(now.saturating_duration_since(oldest)))
    }
}

/// All windows tracked for a single client identity.
#[derive(Debug)]
struct ClientWindows {
    scopes: HashMap<String, Vec<WindowLog>>,
    last_seen: Instant,
}

#[derive(Debug)]
struct LimiterState {
    clients: HashMap<String, ClientWindows>,
    last_sweep: Option<Instant>,
}

/// In-memory, per-client rate limiter with global and per-route tiers.
///
/// Every admission is a single check-then-consume under one lock, so a
/// client cannot slip past its ceiling through concurrent requests.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState {
                clients: HashMap::new(),
                last_sweep: None,
            }),
        }
    }

    /// Admit or deny one request from `client` on `route` at `now`.
    ///
    /// Global tiers always apply; route tiers apply in addition when configured.
    /// A denial consumes nothing.
    pub fn admit(&self, client: &str, route: &str, now: Instant) -> Result<Decision, GatewayError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GatewayError::Internal("Failed to acquire rate limiter lock".to_string()))?;

        self.maybe_sweep(&mut state, now);

        let route_tiers = self.config.route_tiers(route);
        let applicable: [(&str, &[RateTier]); 2] =
            [(GLOBAL_SCOPE, self.config.global.as_slice()), (route, route_tiers)];

        let client_state = state
            .clients
            .entry(client.to_string())
            .or_insert_with(|| ClientWindows {
                scopes: HashMap::new(),
                last_seen: now,
            });

        // Check every tier before touching any counter.
        for (scope, tiers) in applicable {
            if tiers.is_empty() {
                continue;
            }
            let logs = client_state
                .scopes
                .entry(scope.to_string())
                .or_insert_with(|| tiers.iter().map(|_| WindowLog::default()).collect());

            for (tier, log) in tiers.iter().zip(logs.iter_mut()) {
                log.prune(tier.window, now);
                if let Some(retry_after) = log.wait_time(tier, now) {
                    return Ok(Decision::Denied {
                        scope: scope.to_string(),
                        tier: *tier,
                        retry_after,
                    });
                }
            }
        }

        for (scope, tiers) in applicable {
            if let Some(logs) = client_state.scopes.get_mut(scope) {
                for log in logs.iter_mut().take(tiers.len()) {
                    log.hits.push_back(now);
                }
            }
        }
        client_state.last_seen = now;

        Ok(Decision::Allowed)
    }

    fn maybe_sweep(&self, state: &mut LimiterState, now: Instant) {
        let due = match state.last_sweep {
            Some(last) => now.saturating_duration_since(last) >= self.config.cleanup_interval,
            None => true,
        };
        if !due {
            return;
        }
        state.last_sweep = Some(now);

        let removed = Self::evict_stale(&mut state.clients, self.config.longest_window(), now);
        if removed > 0 {
            tracing::debug!(removed, remaining = state.clients.len(), "Evicted idle rate limit entries");
        }
    }

    fn evict_stale(clients: &mut HashMap<String, ClientWindows>, max_age: Duration, now: Instant) -> usize {
        let before = clients.len();
        clients.retain(|_, client| now.saturating_duration_since(client.last_seen) < max_age);
        before - clients.len()
    }

    /// Drop clients idle for longer than the longest window. Returns how many were removed.
    pub fn cleanup_expired(&self, now: Instant) -> Result<usize, GatewayError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GatewayError::Internal("Failed to acquire rate limiter lock".to_string()))?;

        state.last_sweep = Some(now);
        Ok(Self::evict_stale(&mut state.clients, self.config.longest_window(), now))
    }

    /// Number of client identities currently tracked.
    pub fn tracked_clients(&self) -> Result<usize, GatewayError> {
        let state = self
            .state
            .lock()
            .map_err(|_| GatewayError::Internal("Failed to acquire rate limiter lock".to_string()))?;
        Ok(state.clients.len())
    }
}
