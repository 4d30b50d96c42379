use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

use crate::response::ApiResponse;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Terminal failures of a `/send` request. Each one maps to a structured response.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed request body: {0}")]
    Parse(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// `token` holds the masked form only.
    #[error("token {token} not in allow-set")]
    Unauthorized { token: String },

    #[error("rate limit exceeded ({tier})")]
    RateLimited { tier: String, retry_after: Duration },

    #[error("notification delivery failed: {0}")]
    DeliveryFailure(#[from] NotifyError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Parse(_) | GatewayError::MissingField(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::DeliveryFailure(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Never carries internal detail.
    pub fn client_message(&self) -> &'static str {
        match self {
            GatewayError::Parse(_) => "无效的JSON格式",
            GatewayError::MissingField(_) => "缺少必要参数token或content",
            GatewayError::Unauthorized { .. } => "无效的token",
            GatewayError::RateLimited { .. } => "请求过于频繁，请稍后再试",
            GatewayError::DeliveryFailure(_) => "通知发送失败",
            GatewayError::Internal(_) => "服务器内部错误",
        }
    }

    /// Short machine-friendly label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Parse(_) => "parse_error",
            GatewayError::MissingField(_) => "missing_field",
            GatewayError::Unauthorized { .. } => "unauthorized",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::DeliveryFailure(_) => "delivery_failure",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut resp = ApiResponse::new(self.status(), self.client_message()).into_response();

        if let GatewayError::RateLimited { retry_after, .. } = &self {
            // Round up so clients never retry a moment too early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        resp
    }
}

/// Failures reported by a notification collaborator.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint responded with status {0}")]
    Status(u16),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => NotifyError::Status(status.as_u16()),
            None => NotifyError::Transport(err.to_string()),
        }
    }
}
