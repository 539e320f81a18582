use axum::{Json, extract::State, http::HeaderMap, response::Response};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::backend::forwarded_auth;
use crate::error::GatewayError;
use crate::metrics::REQUEST_TOTAL;
use crate::state::AppState;

use super::ugrozena_lica::relay;

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();
    info!("Forwarding login");
    let res = state
        .backend
        .post("/api/auth/login", payload, forwarded_auth(&headers))
        .await?;
    Ok(relay(res))
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();
    info!("Forwarding registration");
    let res = state
        .backend
        .post("/api/auth/register", payload, forwarded_auth(&headers))
        .await?;
    Ok(relay(res))
}
