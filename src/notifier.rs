//! Outbound notification delivery.
//!
//! The gateway only depends on the [`Notifier`] trait. A webhook backend is
//! provided for real deployments and a log-only backend for local runs.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::NotifyError;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification. Called at most once per admitted request.
    async fn send(&self, title: &str, content: &str) -> Result<(), NotifyError>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    content: &'a str,
}

/// Posts `{"title", "content"}` as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, title: &str, content: &str) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&WebhookPayload { title, content })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        tracing::debug!(status = %status, "Webhook accepted notification");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Writes notifications to the log instead of delivering them.
///
/// Content carries verification codes, so it only appears at debug level.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, title: &str, content: &str) -> Result<(), NotifyError> {
        tracing::info!(title = %title, content_chars = content.chars().count(), "Notification logged");
        tracing::debug!(title = %title, content = %content, "Logged notification content");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
