//! Lifecycle events emitted to downstream consumers.
//!
//! The publisher only sees a topic and an opaque JSON payload; the shape of
//! each payload is fixed here, one struct per event kind.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::{Transaction, TransactionStatus, TransactionType};

pub const TOPIC_TRANSACTION_CREATED: &str = "transaction.created";
pub const TOPIC_TRANSACTION_STATUS_UPDATED: &str = "transaction.status.updated";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCreated {
    pub transaction_id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusUpdated {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub failure_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Created(TransactionCreated),
    StatusUpdated(TransactionStatusUpdated),
}

impl LifecycleEvent {
    pub fn created(tx: &Transaction) -> Self {
        LifecycleEvent::Created(TransactionCreated {
            transaction_id: tx.id,
            user_id: tx.user_id.clone(),
            transaction_type: tx.transaction_type,
            amount: tx.amount.clone(),
            timestamp: Utc::now(),
        })
    }

    pub fn status_updated(tx: &Transaction) -> Self {
        LifecycleEvent::StatusUpdated(TransactionStatusUpdated {
            transaction_id: tx.id,
            status: tx.status,
            failure_reason: tx.failure_reason.clone(),
            timestamp: Utc::now(),
        })
    }

    pub fn topic(&self) -> &'static str {
        match self {
            LifecycleEvent::Created(_) => TOPIC_TRANSACTION_CREATED,
            LifecycleEvent::StatusUpdated(_) => TOPIC_TRANSACTION_STATUS_UPDATED,
        }
    }

    pub fn transaction_id(&self) -> Uuid {
        match self {
            LifecycleEvent::Created(e) => e.transaction_id,
            LifecycleEvent::StatusUpdated(e) => e.transaction_id,
        }
    }

    pub fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            LifecycleEvent::Created(e) => serde_json::to_value(e),
            LifecycleEvent::StatusUpdated(e) => serde_json::to_value(e),
        }
    }
}
