//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStats, TransactionStatus};
use crate::ports::{Page, RepositoryError, RepositoryResult, StatusUpdate, TransactionRepository};

const COLUMNS: &str = "id, user_id, transaction_type, status, amount, currency, description, \
     vpa, to_user_id, bank_account, ifsc, gateway_transaction_id, upi_reference, \
     initiated_at, completed_at, failure_reason, metadata, created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, user_id, transaction_type, status, amount, currency, description,
                vpa, to_user_id, bank_account, ifsc, gateway_transaction_id, upi_reference,
                initiated_at, completed_at, failure_reason, metadata, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tx.id)
        .bind(&tx.user_id)
        .bind(tx.transaction_type.as_str())
        .bind(tx.status.as_str())
        .bind(&tx.amount)
        .bind(&tx.currency)
        .bind(&tx.description)
        .bind(&tx.vpa)
        .bind(&tx.to_user_id)
        .bind(&tx.bank_account)
        .bind(&tx.ifsc)
        .bind(&tx.gateway_transaction_id)
        .bind(&tx.upi_reference)
        .bind(tx.initiated_at)
        .bind(tx.completed_at)
        .bind(&tx.failure_reason)
        .bind(&tx.metadata)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(tx.id)
            }
            other => RepositoryError::Database(other),
        })?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound(id))?.into_domain()
    }

    async fn list_for_user(&self, user_id: &str, page: Page) -> RepositoryResult<Vec<Transaction>> {
        // LIMIT NULL is LIMIT ALL and OFFSET NULL is OFFSET 0.
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM transactions
            WHERE user_id = $1 OR to_user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        update: &StatusUpdate,
    ) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $1,
                completed_at = $2,
                failure_reason = COALESCE($3, failure_reason),
                upi_reference = COALESCE($4, upi_reference),
                updated_at = NOW()
            WHERE id = $5 AND status = $6
            RETURNING {COLUMNS}
            "#
        ))
        .bind(update.status.as_str())
        .bind(update.completed_at)
        .bind(&update.failure_reason)
        .bind(&update.upi_reference)
        .bind(id)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn record_gateway_reference(
        &self,
        id: Uuid,
        gateway_transaction_id: &str,
    ) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET gateway_transaction_id = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(gateway_transaction_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound(id))?.into_domain()
    }

    async fn stats_for_user(&self, user_id: &str) -> RepositoryResult<TransactionStats> {
        // One statement, one snapshot.
        let (total, successful, failed, pending) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'SUCCESS'),
                COUNT(*) FILTER (WHERE status = 'FAILED'),
                COUNT(*) FILTER (WHERE status = 'PENDING')
            FROM transactions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(TransactionStats {
            total,
            successful,
            failed,
            pending,
        })
    }

    async fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM transactions
            WHERE status = 'PENDING'
              AND gateway_transaction_id IS NOT NULL
              AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#
        ))
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: String,
    transaction_type: String,
    status: String,
    amount: bigdecimal::BigDecimal,
    currency: String,
    description: Option<String>,
    vpa: Option<String>,
    to_user_id: Option<String>,
    bank_account: Option<String>,
    ifsc: Option<String>,
    gateway_transaction_id: Option<String>,
    upi_reference: Option<String>,
    initiated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let transaction_type = self.transaction_type.parse().map_err(RepositoryError::Decode)?;
        let status = self.status.parse().map_err(RepositoryError::Decode)?;

        Ok(Transaction {
            id: self.id,
            user_id: self.user_id,
            transaction_type,
            status,
            amount: self.amount,
            currency: self.currency,
            description: self.description,
            vpa: self.vpa,
            to_user_id: self.to_user_id,
            bank_account: self.bank_account,
            ifsc: self.ifsc,
            gateway_transaction_id: self.gateway_transaction_id,
            upi_reference: self.upi_reference,
            initiated_at: self.initiated_at,
            completed_at: self.completed_at,
            failure_reason: self.failure_reason,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
