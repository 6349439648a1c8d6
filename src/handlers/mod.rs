pub mod transactions;
pub mod webhook;
pub mod ws;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::AppState;

/// Dependency health plus the gateway breaker state. 503 when the store is down.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = state
        .health
        .check(state.lifecycle.gateway_circuit_state())
        .await;

    let status_code = if response.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}
