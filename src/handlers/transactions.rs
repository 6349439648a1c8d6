use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::TransactionType;
use crate::error::AppError;
use crate::middleware::CallerId;
use crate::services::CreateTransactionRequest;
use crate::AppState;

pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpiPaymentRequest {
    pub amount: BigDecimal,
    pub vpa: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct P2pTransferRequest {
    pub amount: BigDecimal,
    pub to_user_id: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn create_transaction(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.lifecycle.submit(&user_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn initiate_upi_payment(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(body): Json<UpiPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let request = CreateTransactionRequest {
        transaction_type: TransactionType::UpiPayment.to_string(),
        amount: body.amount,
        description: body.description,
        vpa: body.vpa,
        to_user_id: None,
        bank_account: None,
        ifsc: None,
        metadata: body.metadata,
    };

    let response = state.lifecycle.submit(&user_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn initiate_p2p_transfer(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(body): Json<P2pTransferRequest>,
) -> Result<impl IntoResponse, AppError> {
    let request = CreateTransactionRequest {
        transaction_type: TransactionType::P2pTransfer.to_string(),
        amount: body.amount,
        description: body.description,
        vpa: None,
        to_user_id: body.to_user_id,
        bank_account: None,
        ifsc: None,
        metadata: body.metadata,
    };

    let response = state.lifecycle.submit(&user_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let transactions = state
        .lifecycle
        .query(
            &user_id,
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            params.offset.unwrap_or(0),
        )
        .await?;

    Ok(Json(json!({ "transactions": transactions })))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let tx = state.lifecycle.get_for_user(id, &user_id).await?;
    Ok(Json(tx))
}

pub async fn cancel_transaction(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let tx = state.lifecycle.cancel(id, &user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Transaction cancelled",
        "transaction": tx,
    })))
}

pub async fn transaction_stats(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.lifecycle.stats(&user_id).await?;
    Ok(Json(stats))
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid transaction ID".to_string()))
}
