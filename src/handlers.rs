use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::Local;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::middleware::client_identity;
use crate::response::{ApiResponse, HealthResponse};

/// Shared application state
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub gateway: Gateway,
    pub trust_proxy_headers: bool,
}

/// Receive a message, extract its code and forward it as a notification
pub async fn send_notification(
    State(state): State<SharedState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<ApiResponse, GatewayError> {
    let client = client_identity(
        &headers,
        connect_info.map(|ConnectInfo(addr)| addr),
        state.trust_proxy_headers,
    );
    tracing::info!("Received request from {}", client);

    // Unreadable or oversized bodies get the same JSON 400 as malformed ones.
    let body = body.map_err(|rejection| {
        let err = GatewayError::Parse(rejection.body_text());
        Gateway::log_failure(&client, &err);
        err
    })?;

    state
        .gateway
        .handle_send(&client, &body, Instant::now(), Local::now().naive_local())
        .await?;

    Ok(ApiResponse::sent())
}

/// Liveness probe. Not rate limited and needs no token.
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse::healthy(Local::now().naive_local()))
}
