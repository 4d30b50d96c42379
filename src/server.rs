use crate::config::Config;
use crate::config_validator::{ConfigError, ConfigValidator};
use crate::error::NotifyError;
use crate::gateway::Gateway;
use crate::handlers::{health_check, send_notification, AppState, SharedState};
use crate::middleware::logging_middleware;
use crate::notifier::{LogNotifier, Notifier, WebhookNotifier};
use crate::rate_limiter::RateLimiter;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build notifier: {0}")]
    Notifier(#[from] NotifyError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Largest `/send` body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the router around an already assembled state.
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/send", post(send_notification))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

/// Assemble the gateway state from configuration.
pub fn build_state(config: &Config, notifier: Arc<dyn Notifier>) -> Result<SharedState, ServerError> {
    ConfigValidator::validate(config)?;

    let limits = config
        .rate_limits()
        .map_err(|source| ConfigError::RateLimit {
            var: "RATE_LIMIT_DEFAULT/RATE_LIMIT_SEND",
            source,
        })?;

    let tokens = config.allowed_tokens();
    if config.uses_default_token() {
        tracing::warn!("ALLOWED_TOKENS not set, using the built-in default token; override it in production");
    }
    tracing::info!(tokens = tokens.len(), notifier = notifier.name(), "Gateway configured");

    let gateway = Gateway::new(
        RateLimiter::new(limits),
        tokens,
        notifier,
        config.notify_timeout(),
    );

    Ok(Arc::new(AppState {
        gateway,
        trust_proxy_headers: config.trust_proxy_headers(),
    }))
}

/// Pick the delivery backend named by configuration.
pub fn notifier_from_config(config: &Config) -> Result<Arc<dyn Notifier>, ServerError> {
    match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Delivering notifications to webhook");
            Ok(Arc::new(WebhookNotifier::new(url.trim(), config.notify_timeout())?))
        }
        None => {
            tracing::warn!("NOTIFY_WEBHOOK_URL not set, notifications are only logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

pub struct Server {
    app: Router,
    addr: SocketAddr,
}

impl Server {
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let notifier = notifier_from_config(&config)?;
        Self::with_notifier(config, notifier)
    }

    pub fn with_notifier(config: Config, notifier: Arc<dyn Notifier>) -> Result<Self, ServerError> {
        let state = build_state(&config, notifier)?;

        Ok(Self {
            app: create_app(state),
            addr: config.bind_addr(),
        })
    }

    pub async fn run(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        tracing::info!("Notify gateway listening on {}", self.addr);
        tracing::info!("Health check available at /health");

        // Run server with graceful shutdown
        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_state_rejects_invalid_config() {
        let config = Config {
            rate_limit_default: "never".to_string(),
            ..Config::default()
        };
        let result = build_state(&config, Arc::new(LogNotifier));
        assert!(matches!(result, Err(ServerError::Config(ConfigError::RateLimit { .. }))));
    }

    #[test]
    fn test_notifier_selection() {
        let config = Config::default();
        assert_eq!(notifier_from_config(&config).unwrap().name(), "log");

        let config = Config {
            notify_webhook_url: Some("https://hooks.example.com/n".to_string()),
            ..Config::default()
        };
        assert_eq!(notifier_from_config(&config).unwrap().name(), "webhook");
    }

    #[test]
    fn test_server_binds_all_interfaces() {
        let server = Server::with_notifier(Config::default(), Arc::new(LogNotifier)).unwrap();
        assert_eq!(server.addr.to_string(), "0.0.0.0:9700");
    }
}
