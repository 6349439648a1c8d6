//! Outbound seams of the lifecycle engine: storage, event stream and payment gateway.
//! Concrete adapters live in `adapters`, `events` and `gateway`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStats, TransactionStatus};
use crate::gateway::{GatewayError, GatewayStatusReport, PaymentHandle, PaymentRequest};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Transaction {0} not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Transaction {0} already exists")]
    Duplicate(Uuid),
    #[error("Corrupt transaction row: {0}")]
    Decode(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Page bounds. `None` means unbounded for that parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    /// Builds a page from raw caller values, treating non-positive values as "no bound".
    pub fn from_raw(limit: i64, offset: i64) -> Self {
        Self {
            limit: (limit > 0).then_some(limit),
            offset: (offset > 0).then_some(offset),
        }
    }
}

/// Fields written together by a single conditional status update.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: TransactionStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub upi_reference: Option<String>,
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;

    /// Transactions the user initiated or is the counterparty of, newest first.
    async fn list_for_user(&self, user_id: &str, page: Page) -> RepositoryResult<Vec<Transaction>>;

    /// Atomically applies `update` only if the stored status still equals `expected`.
    /// Returns `None` when the precondition no longer holds.
    async fn update_status_if(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        update: &StatusUpdate,
    ) -> RepositoryResult<Option<Transaction>>;

    /// Stores the gateway's own id for later `verify` calls. Leaves status untouched.
    async fn record_gateway_reference(
        &self,
        id: Uuid,
        gateway_transaction_id: &str,
    ) -> RepositoryResult<Transaction>;

    async fn stats_for_user(&self, user_id: &str) -> RepositoryResult<TransactionStats>;

    /// PENDING transactions with a gateway reference created before `older_than`, oldest first.
    async fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>>;
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publish to {topic} timed out after {timeout_ms}ms")]
    Timeout { topic: String, timeout_ms: u128 },
    #[error("publish transport error: {0}")]
    Transport(String),
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0} of {1} publishers failed: {2}")]
    Partial(usize, usize, String),
}

impl From<redis::RedisError> for PublishError {
    fn from(err: redis::RedisError) -> Self {
        PublishError::Transport(err.to_string())
    }
}

/// Best-effort event sink. Callers log failures and carry on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), PublishError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentHandle, GatewayError>;

    async fn verify(&self, gateway_transaction_id: &str) -> Result<GatewayStatusReport, GatewayError>;

    fn circuit_state(&self) -> &'static str {
        "closed"
    }
}
