//! Request admission and delivery for `/send`.
//!
//! Stages run in a fixed order and the first failure ends the request:
//! parse body, rate check, required fields, token check, content
//! processing, delivery. Nothing is sent unless both the rate limiter and
//! the allow-set have admitted the request.

use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::auth::{mask_token, AllowedTokens};
use crate::error::{GatewayError, NotifyError, Result};
use crate::extractor;
use crate::notifier::Notifier;
use crate::rate_limit_config::SEND_ROUTE;
use crate::rate_limiter::{Decision, RateLimiter};
use crate::validation::RequestValidator;

/// What was delivered for a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub title: String,
    pub content: String,
    pub code: Option<String>,
}

pub struct Gateway {
    limiter: RateLimiter,
    tokens: AllowedTokens,
    notifier: Arc<dyn Notifier>,
    send_timeout: Duration,
}

impl Gateway {
    pub fn new(
        limiter: RateLimiter,
        tokens: AllowedTokens,
        notifier: Arc<dyn Notifier>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            limiter,
            tokens,
            notifier,
            send_timeout,
        }
    }

    /// Rate gate for any limited route.
    pub fn check_rate(&self, client: &str, route: &str, now: Instant) -> Result<()> {
        match self.limiter.admit(client, route, now)? {
            Decision::Allowed => Ok(()),
            Decision::Denied {
                scope,
                tier,
                retry_after,
            } => Err(GatewayError::RateLimited {
                tier: format!("{scope}: {tier}"),
                retry_after,
            }),
        }
    }

    /// Run one `/send` request through every stage.
    ///
    /// `instant` drives rate accounting, `wall_clock` is stamped into the message.
    pub async fn handle_send(
        &self,
        client: &str,
        body: &[u8],
        instant: Instant,
        wall_clock: NaiveDateTime,
    ) -> Result<Delivered> {
        let result = self.run_stages(client, body, instant, wall_clock).await;

        if let Err(err) = &result {
            Self::log_failure(client, err);
        }

        result
    }

    /// The one log line emitted for a failed `/send` request.
    pub fn log_failure(client: &str, err: &GatewayError) {
        match err {
            GatewayError::DeliveryFailure(_) | GatewayError::Internal(_) => {
                tracing::error!(client = %client, kind = err.kind(), error = %err, "Send request failed")
            }
            _ => warn!(client = %client, kind = err.kind(), error = %err, "Send request rejected"),
        }
    }

    async fn run_stages(
        &self,
        client: &str,
        body: &[u8],
        instant: Instant,
        wall_clock: NaiveDateTime,
    ) -> Result<Delivered> {
        let payload = RequestValidator::parse_send_payload(body)?;

        self.check_rate(client, SEND_ROUTE, instant)?;

        let request = RequestValidator::require_fields(payload)?;
        if !self.tokens.is_authorized(&request.token) {
            return Err(GatewayError::Unauthorized {
                token: mask_token(&request.token),
            });
        }

        let processed = extractor::process(&request.content, wall_clock);
        let code = processed.found_code.map(|found| {
            tracing::debug!(source = ?found.source, "Verification code extracted");
            found.code
        });

        self.deliver(&request.title, &processed.normalized_content).await?;

        info!(
            client = %client,
            token = %mask_token(&request.token),
            notifier = self.notifier.name(),
            has_code = code.is_some(),
            "Notification sent"
        );

        Ok(Delivered {
            title: request.title,
            content: processed.normalized_content,
            code,
        })
    }

    /// Exactly one bounded attempt; no retries.
    async fn deliver(&self, title: &str, content: &str) -> std::result::Result<(), NotifyError> {
        match tokio::time::timeout(self.send_timeout, self.notifier.send(title, content)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.send_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit_config::RateLimitConfig;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOKEN: &str = "test-token-0001";

    #[derive(Default)]
    struct CountingNotifier {
        calls: AtomicUsize,
        fail: bool,
        hang: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _title: &str, _content: &str) -> std::result::Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(NotifyError::Status(503));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn gateway_with(notifier: Arc<CountingNotifier>) -> Gateway {
        Gateway::new(
            RateLimiter::new(RateLimitConfig::default()),
            AllowedTokens::from_csv(TOKEN),
            notifier,
            Duration::from_millis(200),
        )
    }

    fn wall_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_send() {
        let notifier = Arc::new(CountingNotifier::default());
        let gateway = gateway_with(notifier.clone());
        let body = format!(r#"{{"token":"{TOKEN}","content":"验证码：556677"}}"#);

        let delivered = gateway
            .handle_send("1.2.3.4", body.as_bytes(), Instant::now(), wall_clock())
            .await
            .unwrap();

        assert_eq!(delivered.title, "验证码收取");
        assert_eq!(delivered.code.as_deref(), Some("556677"));
        assert!(delivered.content.starts_with("【时间】：2024-05-06 12:00:00\n\n【验证码】：556677"));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parse_error_precedes_rate_check() {
        let notifier = Arc::new(CountingNotifier::default());
        let gateway = gateway_with(notifier.clone());
        let now = Instant::now();

        let err = gateway.handle_send("c", b"{oops", now, wall_clock()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));

        // The malformed request did not use up the 1/second allowance.
        let body = format!(r#"{{"token":"{TOKEN}","content":"hi"}}"#);
        assert!(gateway.handle_send("c", body.as_bytes(), now, wall_clock()).await.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limited_before_auth() {
        let notifier = Arc::new(CountingNotifier::default());
        let gateway = gateway_with(notifier.clone());
        let now = Instant::now();

        let bad = br#"{"token":"nope","content":"hi"}"#;
        let err = gateway.handle_send("c", bad, now, wall_clock()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized { .. }));

        let err = gateway.handle_send("c", bad, now, wall_clock()).await.unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited { .. }));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_token_is_masked() {
        let notifier = Arc::new(CountingNotifier::default());
        let gateway = gateway_with(notifier.clone());
        let body = r#"{"token":"wrong-token-secret","content":"验证码：1234"}"#.as_bytes();

        let err = gateway
            .handle_send("c", body, Instant::now(), wall_clock())
            .await
            .unwrap_err();
        match &err {
            GatewayError::Unauthorized { token } => assert_eq!(token, "wron***"),
            other => panic!("expected unauthorized, got {other:?}"),
        }
        assert!(!err.to_string().contains("wrong-token-secret"));
        assert_eq!(err.client_message(), "无效的token");
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_field_before_token_check() {
        let notifier = Arc::new(CountingNotifier::default());
        let gateway = gateway_with(notifier.clone());

        let err = gateway
            .handle_send("c", br#"{"token":"nope"}"#, Instant::now(), wall_clock())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MissingField("content")));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_not_retried() {
        let notifier = Arc::new(CountingNotifier {
            fail: true,
            ..Default::default()
        });
        let gateway = gateway_with(notifier.clone());
        let body = format!(r#"{{"token":"{TOKEN}","content":"hi"}}"#);

        let err = gateway
            .handle_send("c", body.as_bytes(), Instant::now(), wall_clock())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::DeliveryFailure(NotifyError::Status(503))));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hanging_notifier_times_out() {
        let notifier = Arc::new(CountingNotifier {
            hang: true,
            ..Default::default()
        });
        let gateway = gateway_with(notifier.clone());
        let body = format!(r#"{{"token":"{TOKEN}","content":"hi"}}"#);

        let err = gateway
            .handle_send("c", body.as_bytes(), Instant::now(), wall_clock())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::DeliveryFailure(NotifyError::Timeout(_))));
    }
}
