use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport, timeout or decode failure. The gateway may or may not have seen the request.
    #[error("UPI gateway unavailable: {0}")]
    Unavailable(String),
    /// Well-formed `success: false` answer from the gateway.
    #[error("UPI payment rejected: {0}")]
    Rejected(String),
    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),
}

impl GatewayError {
    /// Message recorded as the transaction's failure reason.
    pub fn reason(&self) -> &str {
        match self {
            GatewayError::Unavailable(msg)
            | GatewayError::Rejected(msg)
            | GatewayError::CircuitOpen(msg) => msg,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Unavailable(err.to_string())
    }
}

/// Outbound initiation request. `order_id` is the transaction id so the gateway
/// can deduplicate retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: BigDecimal,
    pub vpa: String,
    pub description: String,
    pub callback_url: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub success: bool,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub payment_url: String,
    #[serde(default)]
    pub qr_code: String,
    #[serde(default)]
    pub message: String,
}

/// What the caller needs to complete a UPI payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandle {
    pub payment_url: String,
    pub qr_code: String,
    pub gateway_transaction_id: String,
}

/// Status report from the gateway, delivered by webhook or returned by `verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatusReport {
    #[serde(default)]
    pub transaction_id: String,
    pub order_id: String,
    pub status: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub upi_ref: String,
    #[serde(default)]
    pub message: String,
}

pub const GATEWAY_STATUS_SUCCESS: &str = "SUCCESS";
pub const GATEWAY_STATUS_FAILURE: &str = "FAILURE";
