//! In-memory implementation of TransactionRepository.
//!
//! Every conditional update runs under one write lock, which gives the same
//! compare-and-set guarantee the Postgres adapter gets from `WHERE status = $n`.
//! Single-process only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStats, TransactionStatus};
use crate::ports::{Page, RepositoryError, RepositoryResult, StatusUpdate, TransactionRepository};

#[derive(Default)]
struct Inner {
    records: HashMap<Uuid, Transaction>,
    /// Insertion order, used as the tie-breaker for "newest first".
    order: Vec<Uuid>,
}

#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut inner = self.inner.write().await;
        if inner.records.contains_key(&tx.id) {
            return Err(RepositoryError::Duplicate(tx.id));
        }
        inner.records.insert(tx.id, tx.clone());
        inner.order.push(tx.id);
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let inner = self.inner.read().await;
        inner
            .records
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn list_for_user(&self, user_id: &str, page: Page) -> RepositoryResult<Vec<Transaction>> {
        let inner = self.inner.read().await;
        let mut matching: Vec<&Transaction> = inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.records.get(id))
            .filter(|tx| tx.involves(user_id))
            .collect();
        // Stable sort keeps reverse insertion order for equal timestamps.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = page.offset.unwrap_or(0).max(0) as usize;
        let limit = page.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);

        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        update: &StatusUpdate,
    ) -> RepositoryResult<Option<Transaction>> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;

        if record.status != expected {
            return Ok(None);
        }

        record.status = update.status;
        record.completed_at = update.completed_at;
        if let Some(reason) = &update.failure_reason {
            record.failure_reason = Some(reason.clone());
        }
        if let Some(upi_ref) = &update.upi_reference {
            record.upi_reference = Some(upi_ref.clone());
        }
        record.updated_at = Utc::now();

        Ok(Some(record.clone()))
    }

    async fn record_gateway_reference(
        &self,
        id: Uuid,
        gateway_transaction_id: &str,
    ) -> RepositoryResult<Transaction> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        record.gateway_transaction_id = Some(gateway_transaction_id.to_string());
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn stats_for_user(&self, user_id: &str) -> RepositoryResult<TransactionStats> {
        let inner = self.inner.read().await;
        let mut stats = TransactionStats::default();
        for tx in inner.records.values().filter(|tx| tx.user_id == user_id) {
            stats.total += 1;
            match tx.status {
                TransactionStatus::Success => stats.successful += 1,
                TransactionStatus::Failed => stats.failed += 1,
                TransactionStatus::Pending => stats.pending += 1,
                TransactionStatus::Cancelled => {}
            }
        }
        Ok(stats)
    }

    async fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let inner = self.inner.read().await;
        let mut stale: Vec<Transaction> = inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|tx| {
                tx.status == TransactionStatus::Pending
                    && tx.gateway_transaction_id.is_some()
                    && tx.created_at < older_than
            })
            .cloned()
            .collect();
        stale.sort_by_key(|tx| tx.created_at);
        stale.truncate(limit.max(0) as usize);
        Ok(stale)
    }
}
