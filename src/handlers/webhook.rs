use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde_json::json;

use crate::error::AppError;
use crate::gateway::signature::{self, SIGNATURE_HEADER};
use crate::gateway::GatewayStatusReport;
use crate::services::CallbackOutcome;
use crate::AppState;

/// Receives the gateway's asynchronous status report.
///
/// Any accepted report is acknowledged with `{"success": true}`, including
/// unmapped statuses and redeliveries, so the gateway stops retrying.
pub async fn upi_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    if let Some(secret) = &state.webhook_secret {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();

        if !signature::verify(secret, &body, provided) {
            tracing::warn!("Rejected UPI callback with invalid signature");
            return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
        }
    }

    let report: GatewayStatusReport = serde_json::from_slice(&body)
        .map_err(|e| AppError::MalformedCallback(e.to_string()))?;

    tracing::info!(
        order_id = %report.order_id,
        gateway_transaction_id = %report.transaction_id,
        gateway_status = %report.status,
        "UPI callback received"
    );

    match state.lifecycle.reconcile_callback(&report).await? {
        CallbackOutcome::Applied(tx) => {
            tracing::info!(transaction_id = %tx.id, status = %tx.status, "Callback applied");
        }
        CallbackOutcome::Unchanged(tx) => {
            tracing::debug!(transaction_id = %tx.id, "Duplicate callback acknowledged");
        }
        CallbackOutcome::Ignored { .. } => {}
    }

    Ok(Json(json!({ "success": true })))
}
