//! Retention Worker - 草稿清理
//!
//! Paid drafts are deleted after a short grace window so displays can show
//! the payment; drafts untouched for too long are swept as abandoned.
//! Startup runs one sweep so a crash between payment and deletion does not
//! leave paid records behind.

use serde_json::json;
use shared::message::{EventKind, SyncMessage};
use shared::order::{DraftOrder, OrderStatus};
use shared::util::now_millis;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broadcast::SyncChannel;
use crate::store::{DraftStore, StoreResult};

pub const DEFAULT_PAID_GRACE: Duration = Duration::from_secs(2);
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Delay between payment and deletion
    pub paid_grace: Duration,
    /// Drafts whose `updated_at` is older than this are removed
    pub stale_after: Duration,
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            paid_grace: DEFAULT_PAID_GRACE,
            stale_after: DEFAULT_STALE_AFTER,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub paid_removed: Vec<String>,
    pub stale_removed: Vec<String>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.paid_removed.len() + self.stale_removed.len()
    }
}

#[derive(Clone)]
pub struct RetentionWorker {
    store: Arc<dyn DraftStore>,
    channel: SyncChannel,
    policy: RetentionPolicy,
}

impl std::fmt::Debug for RetentionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionWorker")
            .field("channel", &self.channel.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl RetentionWorker {
    pub fn new(store: Arc<dyn DraftStore>, channel: SyncChannel, policy: RetentionPolicy) -> Self {
        Self {
            store,
            channel,
            policy,
        }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Delete a paid order once the grace window has passed
    ///
    /// The order is re-read when the timer fires and left alone unless it is
    /// still `Paid`.
    pub fn schedule_deletion(&self, order_id: impl Into<String>) -> JoinHandle<()> {
        let order_id = order_id.into();
        let worker = self.clone();
        tracing::debug!(order_id = %order_id, grace_ms = self.policy.paid_grace.as_millis() as u64, "Paid order deletion scheduled");

        tokio::spawn(async move {
            tokio::time::sleep(worker.policy.paid_grace).await;
            match worker.delete_if_paid(&order_id).await {
                Ok(true) => tracing::info!(order_id = %order_id, "Paid draft removed"),
                Ok(false) => {
                    tracing::debug!(order_id = %order_id, "Scheduled deletion skipped, order not paid or gone")
                }
                Err(e) => {
                    tracing::error!(order_id = %order_id, error = %e, "Scheduled deletion failed, next sweep will retry")
                }
            }
        })
    }

    async fn delete_if_paid(&self, order_id: &str) -> StoreResult<bool> {
        match self.store.get_order(order_id).await? {
            Some(order) if order.status == OrderStatus::Paid => {
                self.remove(&order, "paid").await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Items first, then the order; `order_deleted` after both are gone
    async fn remove(&self, order: &DraftOrder, reason: &str) -> StoreResult<()> {
        self.store.delete_all_items_for_order(&order.id).await?;
        self.store.delete_order(&order.id).await?;
        self.channel.notify(SyncMessage::new(
            EventKind::OrderDeleted,
            &order.id,
            order.scope_id(),
            json!({ "reason": reason }),
        ));
        Ok(())
    }

    pub async fn sweep(&self) -> StoreResult<SweepReport> {
        self.sweep_at(now_millis()).await
    }

    /// Sweep as of `now` (unix millis)
    pub async fn sweep_at(&self, now: i64) -> StoreResult<SweepReport> {
        let grace_ms = self.policy.paid_grace.as_millis() as i64;
        let stale_ms = self.policy.stale_after.as_millis() as i64;
        let mut report = SweepReport::default();

        for order in self.store.get_all_orders().await? {
            if order.status == OrderStatus::Paid {
                let paid_at = order.paid_at.unwrap_or(order.updated_at);
                if now - paid_at >= grace_ms {
                    self.remove(&order, "paid").await?;
                    report.paid_removed.push(order.id);
                }
            } else if now - order.updated_at > stale_ms {
                tracing::info!(order_id = %order.id, updated_at = order.updated_at, "Removing abandoned draft");
                self.remove(&order, "stale").await?;
                report.stale_removed.push(order.id);
            }
        }

        if report.total() > 0 {
            tracing::info!(
                paid = report.paid_removed.len(),
                stale = report.stale_removed.len(),
                "Retention sweep removed drafts"
            );
        }
        Ok(report)
    }

    /// Sweep at startup, then on every interval tick until cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.policy.sweep_interval.as_secs(),
            "RetentionWorker started"
        );

        let mut interval = tokio::time::interval(self.policy.sweep_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("RetentionWorker received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "Retention sweep failed");
                    }
                }
            }
        }
    }
}
