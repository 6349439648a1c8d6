//! Transaction domain entity and its lifecycle state machine.
//! Framework-agnostic: nothing here knows about HTTP or SQL.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "INR";

/// Kind of financial intent a transaction records. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    #[serde(rename = "UPI_PAYMENT")]
    UpiPayment,
    #[serde(rename = "P2P_TRANSFER")]
    P2pTransfer,
    #[serde(rename = "TOP_UP")]
    TopUp,
    #[serde(rename = "WITHDRAW")]
    Withdraw,
}

impl TransactionType {
    pub const ALL: [TransactionType; 4] = [
        TransactionType::UpiPayment,
        TransactionType::P2pTransfer,
        TransactionType::TopUp,
        TransactionType::Withdraw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::UpiPayment => "UPI_PAYMENT",
            TransactionType::P2pTransfer => "P2P_TRANSFER",
            TransactionType::TopUp => "TOP_UP",
            TransactionType::Withdraw => "WITHDRAW",
        }
    }

    /// Types whose outcome is decided by the external UPI gateway.
    pub fn is_gateway_backed(&self) -> bool {
        matches!(self, TransactionType::UpiPayment | TransactionType::TopUp)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown transaction type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// `completed_at` is stamped only when a transaction resolves one way or the other.
    pub fn stamps_completion(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }

    pub fn carries_failure_reason(&self) -> bool {
        matches!(self, TransactionStatus::Failed | TransactionStatus::Cancelled)
    }

    /// Decides whether moving from `self` to `target` is legal.
    ///
    /// Re-applying the current status is an idempotent no-op; every terminal
    /// status is frozen against any other target.
    pub fn transition_to(&self, target: TransactionStatus) -> Result<Transition, TransitionError> {
        if *self == target {
            return Ok(Transition::AlreadyApplied);
        }

        if self.is_terminal() {
            return Err(TransitionError {
                from: *self,
                to: target,
            });
        }

        Ok(Transition::Apply)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "SUCCESS" => Ok(TransactionStatus::Success),
            "FAILED" => Ok(TransactionStatus::Failed),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply,
    AlreadyApplied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("transaction is already {from}; cannot move to {to}")]
pub struct TransitionError {
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

/// Domain entity representing a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: BigDecimal,
    pub currency: String,
    pub description: Option<String>,
    pub vpa: Option<String>,
    pub to_user_id: Option<String>,
    pub bank_account: Option<String>,
    pub ifsc: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub upi_reference: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies for a new transaction.
#[derive(Debug, Clone, Default)]
pub struct NewTransaction {
    pub description: Option<String>,
    pub vpa: Option<String>,
    pub to_user_id: Option<String>,
    pub bank_account: Option<String>,
    pub ifsc: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl Transaction {
    pub fn new(
        user_id: String,
        transaction_type: TransactionType,
        amount: BigDecimal,
        currency: String,
        details: NewTransaction,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            transaction_type,
            status: TransactionStatus::Pending,
            amount,
            currency,
            description: details.description,
            vpa: details.vpa,
            to_user_id: details.to_user_id,
            bank_account: details.bank_account,
            ifsc: details.ifsc,
            gateway_transaction_id: None,
            upi_reference: None,
            initiated_at: now,
            completed_at: None,
            failure_reason: None,
            metadata: details.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `user_id` initiated the transaction or is its named counterparty.
    pub fn involves(&self, user_id: &str) -> bool {
        self.user_id == user_id || self.to_user_id.as_deref() == Some(user_id)
    }
}

/// Per-user counts, computed from a single snapshot of the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    #[serde(rename = "totalTransactions")]
    pub total: i64,
    #[serde(rename = "successfulTransactions")]
    pub successful: i64,
    #[serde(rename = "failedTransactions")]
    pub failed: i64,
    #[serde(rename = "pendingTransactions")]
    pub pending: i64,
}
