use serde::Deserialize;
use serde_json::Value;

use crate::error::GatewayError;

/// Title used when the client does not supply one.
pub const DEFAULT_TITLE: &str = "验证码收取";

/// `/send` body as received. Presence of fields is checked separately so that
/// parse failures and missing fields stay distinct.
#[derive(Debug, Default, Deserialize)]
pub struct SendPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A send request with all required fields present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub token: String,
    pub content: String,
    pub title: String,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Parse the raw body. Anything other than a JSON object with string fields is rejected.
    pub fn parse_send_payload(body: &[u8]) -> Result<SendPayload, GatewayError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| GatewayError::Parse(e.to_string()))?;

        if !value.is_object() {
            return Err(GatewayError::Parse("expected a JSON object".to_string()));
        }

        serde_json::from_value(value).map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// Require `token` and `content`; default the title.
    pub fn require_fields(payload: SendPayload) -> Result<NotificationRequest, GatewayError> {
        let token = payload.token.ok_or(GatewayError::MissingField("token"))?;
        let content = payload.content.ok_or(GatewayError::MissingField("content"))?;
        let title = payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());

        Ok(NotificationRequest {
            token,
            content,
            title,
        })
    }
}
