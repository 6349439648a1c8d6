//! The transaction lifecycle engine.
//!
//! Every status change funnels through [`TransactionLifecycle::apply_status_update`]
//! (or the report path that shares its internals). Legality is checked against
//! the domain state machine and then enforced again by the store's conditional
//! update, which is the only serialization point between concurrent writers.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    LifecycleEvent, NewTransaction, Transaction, TransactionStats, TransactionStatus,
    TransactionType, Transition, TransitionError,
};
use crate::error::AppError;
use crate::gateway::{
    GatewayError, GatewayStatusReport, PaymentHandle, PaymentRequest, GATEWAY_STATUS_FAILURE,
    GATEWAY_STATUS_SUCCESS,
};
use crate::ports::{EventPublisher, Page, PaymentGateway, StatusUpdate, TransactionRepository};
use crate::validation::{
    require_present, sanitize_string, validate_amount_precision, validate_bank_account,
    validate_ifsc, validate_max_len, validate_metadata, validate_positive_amount,
    validate_user_id, validate_vpa, ValidationError, DESCRIPTION_MAX_LEN, PAYLOAD_FIELD_MAX_LEN,
};

pub const CANCELLED_BY_USER: &str = "Cancelled by user";
pub const DEFAULT_GATEWAY_FAILURE: &str = "Payment failed at gateway";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub amount: BigDecimal,
    pub description: Option<String>,
    pub vpa: Option<String>,
    pub to_user_id: Option<String>,
    pub bank_account: Option<String>,
    pub ifsc: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub transaction: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

impl TransactionResponse {
    fn plain(transaction: Transaction) -> Self {
        Self {
            transaction,
            payment_url: None,
            qr_code: None,
        }
    }
}

/// Result of asking the gateway to start a payment.
///
/// A failed initiation is a normal outcome: the transaction has already been
/// driven to FAILED by the time the caller sees it.
#[derive(Debug, Clone)]
pub enum InitiationOutcome {
    Initiated {
        transaction: Transaction,
        handle: PaymentHandle,
    },
    Failed {
        transaction: Transaction,
        error: GatewayError,
    },
}

impl InitiationOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            InitiationOutcome::Initiated { transaction, .. }
            | InitiationOutcome::Failed { transaction, .. } => transaction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    /// This call won the transition; an event was emitted.
    Transitioned(Transaction),
    /// The record already had the requested status.
    Unchanged(Transaction),
}

impl StatusChange {
    pub fn transaction(&self) -> &Transaction {
        match self {
            StatusChange::Transitioned(tx) | StatusChange::Unchanged(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            StatusChange::Transitioned(tx) | StatusChange::Unchanged(tx) => tx,
        }
    }

    pub fn is_transitioned(&self) -> bool {
        matches!(self, StatusChange::Transitioned(_))
    }
}

/// How a gateway status report was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Applied(Transaction),
    Unchanged(Transaction),
    /// The gateway status is not one that resolves a payment; nothing was touched.
    Ignored { status: String },
}

#[derive(Clone)]
pub struct TransactionLifecycle {
    repository: Arc<dyn TransactionRepository>,
    publisher: Arc<dyn EventPublisher>,
    gateway: Arc<dyn PaymentGateway>,
    callback_url: String,
    default_currency: String,
}

impl TransactionLifecycle {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        publisher: Arc<dyn EventPublisher>,
        gateway: Arc<dyn PaymentGateway>,
        callback_url: String,
        default_currency: String,
    ) -> Self {
        Self {
            repository,
            publisher,
            gateway,
            callback_url,
            default_currency,
        }
    }

    /// Validates and persists a new PENDING transaction, then announces it.
    pub async fn create(
        &self,
        user_id: &str,
        request: CreateTransactionRequest,
    ) -> Result<Transaction, AppError> {
        let (transaction_type, details) = validate_request(user_id, &request)?;

        let tx = Transaction::new(
            user_id.to_string(),
            transaction_type,
            request.amount,
            self.default_currency.clone(),
            details,
        );
        let tx = self.repository.insert(&tx).await?;

        tracing::info!(
            transaction_id = %tx.id,
            user_id = %tx.user_id,
            transaction_type = %tx.transaction_type,
            amount = %tx.amount,
            "Transaction created"
        );
        self.emit(LifecycleEvent::created(&tx)).await;

        Ok(tx)
    }

    /// Asks the gateway to start a payment for a PENDING gateway-backed transaction.
    ///
    /// On gateway failure the transaction is moved to FAILED before returning.
    pub async fn initiate_gateway_payment(
        &self,
        tx: &Transaction,
    ) -> Result<InitiationOutcome, AppError> {
        if !tx.transaction_type.is_gateway_backed() {
            return Err(AppError::InvalidState(format!(
                "{} transactions are not settled through the UPI gateway",
                tx.transaction_type
            )));
        }
        if tx.status != TransactionStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Transaction {} is {}, not PENDING",
                tx.id, tx.status
            )));
        }
        let vpa = require_present("vpa", tx.vpa.as_deref())?;

        let request = PaymentRequest {
            amount: tx.amount.clone(),
            vpa: vpa.to_string(),
            description: tx
                .description
                .clone()
                .unwrap_or_else(|| format!("{} {}", tx.transaction_type, tx.id)),
            callback_url: self.callback_url.clone(),
            order_id: tx.id.to_string(),
        };

        match self.gateway.initiate(&request).await {
            Ok(handle) => {
                tracing::info!(
                    transaction_id = %tx.id,
                    gateway_transaction_id = %handle.gateway_transaction_id,
                    "UPI payment initiated"
                );
                let transaction = self.remember_gateway_reference(tx, &handle).await;
                Ok(InitiationOutcome::Initiated {
                    transaction,
                    handle,
                })
            }
            Err(error) => {
                tracing::error!(transaction_id = %tx.id, error = %error, "UPI initiation failed");
                let transaction = self.fail_after_initiation(tx.id, &error).await?;
                Ok(InitiationOutcome::Failed { transaction, error })
            }
        }
    }

    async fn remember_gateway_reference(
        &self,
        tx: &Transaction,
        handle: &PaymentHandle,
    ) -> Transaction {
        if handle.gateway_transaction_id.is_empty() {
            return tx.clone();
        }

        match self
            .repository
            .record_gateway_reference(tx.id, &handle.gateway_transaction_id)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                // The callback still locates the record by order id.
                tracing::error!(
                    transaction_id = %tx.id,
                    error = %e,
                    "Failed to store gateway transaction id"
                );
                tx.clone()
            }
        }
    }

    async fn fail_after_initiation(
        &self,
        id: Uuid,
        error: &GatewayError,
    ) -> Result<Transaction, AppError> {
        match self
            .apply_status_update(
                id,
                TransactionStatus::Failed,
                Some(failure_reason(error.reason())),
            )
            .await
        {
            Ok(change) => Ok(change.into_transaction()),
            Err(AppError::InvalidTransition(msg)) => {
                // A callback resolved the payment first; report what is stored.
                tracing::warn!(transaction_id = %id, reason = %msg, "Initiation failure lost to callback");
                Ok(self.repository.get_by_id(id).await?)
            }
            Err(e) => Err(e),
        }
    }

    /// The single choke point for status transitions.
    ///
    /// Re-applying the current status is a no-op success. Moving out of a
    /// terminal status is `InvalidTransition`.
    pub async fn apply_status_update(
        &self,
        id: Uuid,
        status: TransactionStatus,
        reason: Option<String>,
    ) -> Result<StatusChange, AppError> {
        self.transition(id, build_update(status, reason, None)).await
    }

    async fn transition(&self, id: Uuid, update: StatusUpdate) -> Result<StatusChange, AppError> {
        let current = self.repository.get_by_id(id).await?;

        match current.status.transition_to(update.status)? {
            Transition::AlreadyApplied => {
                tracing::debug!(transaction_id = %id, status = %update.status, "Status already applied");
                return Ok(StatusChange::Unchanged(current));
            }
            Transition::Apply => {}
        }

        match self
            .repository
            .update_status_if(id, current.status, &update)
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    transaction_id = %id,
                    from = %current.status,
                    status = %updated.status,
                    "Transaction status updated"
                );
                self.emit(LifecycleEvent::status_updated(&updated)).await;
                Ok(StatusChange::Transitioned(updated))
            }
            None => {
                // Another writer got there first. Decide against what it stored.
                let latest = self.repository.get_by_id(id).await?;
                if latest.status == update.status {
                    Ok(StatusChange::Unchanged(latest))
                } else {
                    tracing::warn!(
                        transaction_id = %id,
                        stored = %latest.status,
                        requested = %update.status,
                        "Lost transition race"
                    );
                    Err(TransitionError {
                        from: latest.status,
                        to: update.status,
                    }
                    .into())
                }
            }
        }
    }

    /// Cancels a PENDING transaction on behalf of its initiator.
    pub async fn cancel(&self, id: Uuid, user_id: &str) -> Result<Transaction, AppError> {
        let tx = self.repository.get_by_id(id).await?;

        if tx.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the initiator can cancel this transaction".to_string(),
            ));
        }
        if tx.status != TransactionStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Transaction is {} and can no longer be cancelled",
                tx.status
            )));
        }

        let change = self
            .apply_status_update(
                id,
                TransactionStatus::Cancelled,
                Some(CANCELLED_BY_USER.to_string()),
            )
            .await?;
        Ok(change.into_transaction())
    }

    /// Applies an asynchronous gateway callback, located by its `orderId`.
    pub async fn reconcile_callback(
        &self,
        report: &GatewayStatusReport,
    ) -> Result<CallbackOutcome, AppError> {
        let id = Uuid::parse_str(report.order_id.trim()).map_err(|_| {
            AppError::MalformedCallback(format!(
                "orderId '{}' is not a transaction id",
                report.order_id
            ))
        })?;

        self.apply_gateway_report(id, report).await
    }

    /// Maps a gateway status report onto the state machine for transaction `id`.
    pub async fn apply_gateway_report(
        &self,
        id: Uuid,
        report: &GatewayStatusReport,
    ) -> Result<CallbackOutcome, AppError> {
        let (status, reason) = match report.status.as_str() {
            GATEWAY_STATUS_SUCCESS => (TransactionStatus::Success, None),
            GATEWAY_STATUS_FAILURE => {
                (TransactionStatus::Failed, Some(failure_reason(&report.message)))
            }
            other => {
                tracing::warn!(
                    transaction_id = %id,
                    gateway_status = %other,
                    "Ignoring gateway report with unmapped status"
                );
                return Ok(CallbackOutcome::Ignored {
                    status: other.to_string(),
                });
            }
        };

        let upi_reference = Some(report.upi_ref.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        match self
            .transition(id, build_update(status, reason, upi_reference))
            .await?
        {
            StatusChange::Transitioned(tx) => Ok(CallbackOutcome::Applied(tx)),
            StatusChange::Unchanged(tx) => Ok(CallbackOutcome::Unchanged(tx)),
        }
    }

    /// Polls the gateway for a PENDING transaction and applies its answer.
    pub async fn verify_and_reconcile(&self, id: Uuid) -> Result<CallbackOutcome, AppError> {
        let tx = self.repository.get_by_id(id).await?;
        if tx.status.is_terminal() {
            return Ok(CallbackOutcome::Unchanged(tx));
        }

        let gateway_id = tx.gateway_transaction_id.as_deref().ok_or_else(|| {
            AppError::InvalidState(format!("Transaction {} has no gateway reference", id))
        })?;

        let report = self.gateway.verify(gateway_id).await?;
        if !report.order_id.is_empty() && report.order_id != id.to_string() {
            tracing::warn!(
                transaction_id = %id,
                order_id = %report.order_id,
                "Gateway verify returned a different order id"
            );
        }

        self.apply_gateway_report(id, &report).await
    }

    /// Creates a transaction and runs the flow its type calls for.
    pub async fn submit(
        &self,
        user_id: &str,
        request: CreateTransactionRequest,
    ) -> Result<TransactionResponse, AppError> {
        let tx = self.create(user_id, request).await?;

        match tx.transaction_type {
            TransactionType::UpiPayment | TransactionType::TopUp => {
                match self.initiate_gateway_payment(&tx).await? {
                    InitiationOutcome::Initiated {
                        transaction,
                        handle,
                    } => Ok(TransactionResponse {
                        transaction,
                        payment_url: Some(handle.payment_url),
                        qr_code: Some(handle.qr_code),
                    }),
                    InitiationOutcome::Failed { error, .. } => Err(error.into()),
                }
            }
            TransactionType::P2pTransfer => {
                let change = self
                    .apply_status_update(tx.id, TransactionStatus::Success, None)
                    .await?;
                Ok(TransactionResponse::plain(change.into_transaction()))
            }
            TransactionType::Withdraw => Ok(TransactionResponse::plain(tx)),
        }
    }

    pub async fn query(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self
            .repository
            .list_for_user(user_id, Page::from_raw(limit, offset))
            .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Transaction, AppError> {
        Ok(self.repository.get_by_id(id).await?)
    }

    /// Returns the transaction if `user_id` is its initiator or counterparty.
    pub async fn get_for_user(&self, id: Uuid, user_id: &str) -> Result<Transaction, AppError> {
        let tx = self.repository.get_by_id(id).await?;
        if !tx.involves(user_id) {
            return Err(AppError::Forbidden(
                "Transaction belongs to another user".to_string(),
            ));
        }
        Ok(tx)
    }

    pub async fn stats(&self, user_id: &str) -> Result<TransactionStats, AppError> {
        Ok(self.repository.stats_for_user(user_id).await?)
    }

    pub async fn stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repository.list_stale_pending(older_than, limit).await?)
    }

    pub fn gateway_circuit_state(&self) -> &'static str {
        self.gateway.circuit_state()
    }

    /// Publishes best-effort. Failures are logged and never surface.
    async fn emit(&self, event: LifecycleEvent) {
        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(transaction_id = %event.transaction_id(), error = %e, "Failed to encode event");
                return;
            }
        };

        if let Err(e) = self.publisher.publish(event.topic(), &payload).await {
            tracing::warn!(
                transaction_id = %event.transaction_id(),
                topic = event.topic(),
                error = %e,
                "Failed to publish event"
            );
        }
    }
}

fn build_update(
    status: TransactionStatus,
    reason: Option<String>,
    upi_reference: Option<String>,
) -> StatusUpdate {
    StatusUpdate {
        status,
        completed_at: status.stamps_completion().then(Utc::now),
        failure_reason: reason.filter(|_| status.carries_failure_reason()),
        upi_reference,
    }
}

/// The gateway's message, or the default when it sent none.
fn failure_reason(message: &str) -> String {
    if message.trim().is_empty() {
        DEFAULT_GATEWAY_FAILURE.to_string()
    } else {
        message.to_string()
    }
}

/// Checks the request and returns the parsed type plus the sanitized details.
fn validate_request(
    user_id: &str,
    request: &CreateTransactionRequest,
) -> Result<(TransactionType, NewTransaction), ValidationError> {
    validate_user_id("userId", user_id)?;

    let transaction_type: TransactionType = request
        .transaction_type
        .trim()
        .parse()
        .map_err(|e: String| ValidationError::new("type", e))?;

    validate_positive_amount(&request.amount)?;
    validate_amount_precision(&request.amount)?;

    let clean = |value: &Option<String>| {
        value
            .as_deref()
            .map(sanitize_string)
            .filter(|v| !v.is_empty())
    };

    let details = NewTransaction {
        description: clean(&request.description),
        vpa: clean(&request.vpa),
        to_user_id: clean(&request.to_user_id),
        bank_account: clean(&request.bank_account),
        ifsc: clean(&request.ifsc),
        metadata: request.metadata.clone(),
    };

    if let Some(description) = &details.description {
        validate_max_len("description", description, DESCRIPTION_MAX_LEN)?;
    }

    // Bounds every payload field, including those the type never reads.
    for (field, value) in [
        ("vpa", &details.vpa),
        ("toUserId", &details.to_user_id),
        ("bankAccount", &details.bank_account),
        ("ifsc", &details.ifsc),
    ] {
        if let Some(value) = value {
            validate_max_len(field, value, PAYLOAD_FIELD_MAX_LEN)?;
        }
    }

    if let Some(metadata) = &details.metadata {
        validate_metadata(metadata)?;
    }

    match transaction_type {
        TransactionType::UpiPayment | TransactionType::TopUp => {
            validate_vpa(require_present("vpa", details.vpa.as_deref())?)?;
        }
        TransactionType::P2pTransfer => {
            let to_user = require_present("toUserId", details.to_user_id.as_deref())?;
            validate_user_id("toUserId", to_user)?;
            if to_user == user_id {
                return Err(ValidationError::new(
                    "toUserId",
                    "cannot transfer to yourself",
                ));
            }
        }
        TransactionType::Withdraw => {
            validate_bank_account(require_present("bankAccount", details.bank_account.as_deref())?)?;
            validate_ifsc(require_present("ifsc", details.ifsc.as_deref())?)?;
        }
    }

    Ok((transaction_type, details))
}
