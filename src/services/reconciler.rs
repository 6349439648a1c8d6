use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::lifecycle::{CallbackOutcome, TransactionLifecycle};
use crate::error::AppError;

const DEFAULT_BATCH_SIZE: i64 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub checked: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Background poller that asks the gateway about PENDING transactions whose
/// webhook never arrived. Each answer goes through the same report path as a
/// callback, so replays are harmless.
pub struct Reconciler {
    lifecycle: TransactionLifecycle,
    poll_interval: Duration,
    stale_after: Duration,
    batch_size: i64,
}

impl Reconciler {
    pub fn new(lifecycle: TransactionLifecycle, poll_interval: Duration, stale_after: Duration) -> Self {
        Self {
            lifecycle,
            poll_interval,
            stale_after,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.poll_interval.as_secs(),
                stale_after_secs = self.stale_after.as_secs(),
                "Reconciliation poller started"
            );

            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.run_once().await {
                    Ok(summary) if summary.checked > 0 => info!(
                        checked = summary.checked,
                        applied = summary.applied,
                        unchanged = summary.unchanged,
                        failed = summary.failed,
                        "Reconciliation pass finished"
                    ),
                    Ok(_) => debug!("No stale pending transactions"),
                    Err(e) => error!(error = %e, "Reconciliation pass failed"),
                }
            }
        })
    }

    /// One pass over the current batch of stale PENDING transactions.
    pub async fn run_once(&self) -> Result<ReconcileSummary, AppError> {
        let stale_after = chrono::Duration::from_std(self.stale_after)
            .map_err(|e| AppError::Internal(format!("invalid stale threshold: {}", e)))?;
        let cutoff = Utc::now() - stale_after;

        let candidates = self.lifecycle.stale_pending(cutoff, self.batch_size).await?;
        let mut summary = ReconcileSummary {
            checked: candidates.len(),
            ..Default::default()
        };

        for tx in candidates {
            match self.lifecycle.verify_and_reconcile(tx.id).await {
                Ok(CallbackOutcome::Applied(updated)) => {
                    info!(transaction_id = %tx.id, status = %updated.status, "Reconciled from gateway");
                    summary.applied += 1;
                }
                Ok(CallbackOutcome::Unchanged(_)) | Ok(CallbackOutcome::Ignored { .. }) => {
                    summary.unchanged += 1;
                }
                Err(e) => {
                    warn!(transaction_id = %tx.id, error = %e, "Reconciliation failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}
