//! Finalization Bridge - 草稿订单结账
//!
//! Hands a completed draft to the remote order API, then marks the local
//! draft `Paid` and schedules its deletion.
//!
//! ```text
//! finalize(order_id)
//!     ├─ in-flight guard (one call per order at a time)
//!     ├─ read order + items, reject Paid
//!     ├─ FinalizationApi::finalize()  ── failure ──▶ draft untouched, retry later
//!     │     (skipped when a receipt is already held for this order)
//!     ├─ status = Paid, paid_at = now, persist  ── failure ──▶ receipt kept
//!     ├─ publish order_updated (displays start their celebration)
//!     └─ RetentionWorker::schedule_deletion()
//! ```

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::message::{EventKind, SyncMessage};
use shared::order::{CustomerRef, DraftOrder, DraftOrderItem, OrderStatus, OrderTotals};
use shared::util::now_millis;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::error::{SyncError, SyncResult};
use super::retention::RetentionWorker;
use crate::broadcast::SyncChannel;
use crate::store::DraftStore;

const FINALIZE_PATH: &str = "/api/orders/finalize";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FinalizationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote answered with a non-success status
    #[error("Remote rejected finalization ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No remote endpoint configured
    #[error("Finalization API unavailable: {0}")]
    Unavailable(String),
}

/// Body sent to the remote order API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationRequest {
    pub order_id: String,
    pub cashier_id: String,
    pub table_number: Option<String>,
    pub customer: Option<CustomerRef>,
    pub items: Vec<DraftOrderItem>,
    pub totals: OrderTotals,
    pub created_at: i64,
}

impl FinalizationRequest {
    pub fn new(order: &DraftOrder, items: Vec<DraftOrderItem>) -> Self {
        Self {
            order_id: order.id.clone(),
            cashier_id: order.cashier_id.clone(),
            table_number: order.table_number.clone(),
            customer: order.customer.clone(),
            items,
            totals: order.totals(),
            created_at: order.created_at,
        }
    }
}

/// Remote acknowledgement
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationReceipt {
    #[serde(default)]
    pub remote_order_id: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
}

/// Remote order API seam
#[async_trait]
pub trait FinalizationApi: Send + Sync {
    async fn finalize(
        &self,
        request: &FinalizationRequest,
    ) -> Result<FinalizationReceipt, FinalizationError>;
}

/// HTTP implementation of [`FinalizationApi`]
#[derive(Debug, Clone)]
pub struct HttpFinalizationApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFinalizationApi {
    pub fn new(base_url: &str) -> Result<Self, FinalizationError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn handle_response(
        resp: reqwest::Response,
    ) -> Result<FinalizationReceipt, FinalizationError> {
        let status = resp.status();

        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FinalizationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(FinalizationReceipt::default());
        }

        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(FinalizationReceipt::default());
        }
        serde_json::from_str(&body).map_err(|e| FinalizationError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl FinalizationApi for HttpFinalizationApi {
    async fn finalize(
        &self,
        request: &FinalizationRequest,
    ) -> Result<FinalizationReceipt, FinalizationError> {
        let url = format!("{}{}", self.base_url, FINALIZE_PATH);
        let resp = self.client.post(&url).json(request).send().await?;
        Self::handle_response(resp).await
    }
}

/// Placeholder used when no remote endpoint is configured
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredFinalizationApi;

#[async_trait]
impl FinalizationApi for UnconfiguredFinalizationApi {
    async fn finalize(
        &self,
        _request: &FinalizationRequest,
    ) -> Result<FinalizationReceipt, FinalizationError> {
        Err(FinalizationError::Unavailable(
            "FINALIZE_API_URL is not set".to_string(),
        ))
    }
}

/// Removes the in-flight marker when dropped
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<String, ()>,
    order_id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a DashMap<String, ()>, order_id: &str) -> SyncResult<Self> {
        match in_flight.entry(order_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(SyncError::FinalizationInProgress(order_id.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(());
                Ok(Self {
                    in_flight,
                    order_id: order_id.to_string(),
                })
            }
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.order_id);
    }
}

pub struct FinalizationBridge {
    store: Arc<dyn DraftStore>,
    channel: SyncChannel,
    api: Arc<dyn FinalizationApi>,
    retention: RetentionWorker,
    in_flight: DashMap<String, ()>,
    /// Remote receipts whose local `Paid` write has not landed yet
    pending_local: DashMap<String, FinalizationReceipt>,
}

impl std::fmt::Debug for FinalizationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizationBridge")
            .field("channel", &self.channel.name())
            .field("in_flight", &self.in_flight.len())
            .field("pending_local", &self.pending_local.len())
            .finish()
    }
}

impl FinalizationBridge {
    pub fn new(
        store: Arc<dyn DraftStore>,
        channel: SyncChannel,
        api: Arc<dyn FinalizationApi>,
        retention: RetentionWorker,
    ) -> Self {
        Self {
            store,
            channel,
            api,
            retention,
            in_flight: DashMap::new(),
            pending_local: DashMap::new(),
        }
    }

    pub fn is_in_flight(&self, order_id: &str) -> bool {
        self.in_flight.contains_key(order_id)
    }

    /// Remote side already accepted the order, local `Paid` write outstanding
    pub fn is_pending_local(&self, order_id: &str) -> bool {
        self.pending_local.contains_key(order_id)
    }

    /// Finalize one draft order
    ///
    /// At most one successful remote call per order. When the remote call
    /// fails the local draft is left as it was and the caller may retry. When
    /// only the local `Paid` write fails, the receipt is held and a retry
    /// skips the remote call.
    pub async fn finalize(&self, order_id: &str) -> SyncResult<FinalizationReceipt> {
        let _guard = InFlightGuard::acquire(&self.in_flight, order_id)?;

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| SyncError::OrderNotFound(order_id.to_string()))?;
        if order.status == OrderStatus::Paid {
            return Err(SyncError::AlreadyFinalized(order_id.to_string()));
        }

        let items = self.store.get_items_for_order(order_id).await?;
        if items.is_empty() {
            return Err(SyncError::InvalidOperation(format!(
                "Order {} has no items to finalize",
                order_id
            )));
        }

        let held = self.pending_local.get(order_id).map(|r| r.value().clone());
        let receipt = match held {
            Some(receipt) => {
                tracing::info!(order_id = %order_id, "Remote already accepted order, retrying local paid write only");
                receipt
            }
            None => self.call_remote(&order, items).await?,
        };

        let mut paid = order;
        let now = now_millis();
        paid.status = OrderStatus::Paid;
        paid.paid_at = Some(now);
        paid.touch(now);

        if let Err(source) = self.store.put_order(&paid).await {
            tracing::error!(
                order_id = %order_id,
                error = %source,
                "Remote finalization succeeded but local paid status was not saved"
            );
            self.pending_local.insert(order_id.to_string(), receipt);
            return Err(SyncError::WriteFailure {
                record: "order",
                source,
            });
        }
        self.pending_local.remove(order_id);

        self.channel.notify(SyncMessage::new(
            EventKind::OrderUpdated,
            &paid.id,
            paid.scope_id(),
            json!({ "status": paid.status, "totalAmount": paid.total_amount }),
        ));
        self.retention.schedule_deletion(paid.id.clone());

        tracing::info!(
            order_id = %paid.id,
            total = paid.total_amount,
            remote_order_id = receipt.remote_order_id.as_deref().unwrap_or("-"),
            "Draft order finalized"
        );
        Ok(receipt)
    }

    async fn call_remote(
        &self,
        order: &DraftOrder,
        items: Vec<DraftOrderItem>,
    ) -> SyncResult<FinalizationReceipt> {
        let order_id = order.id.as_str();
        let request = FinalizationRequest::new(order, items);
        match self.api.finalize(&request).await {
            Ok(receipt) => Ok(receipt),
            Err(source) => {
                tracing::error!(
                    order_id = %order_id,
                    error = %source,
                    "Payment recorded but order sync pending, draft kept for retry"
                );
                Err(SyncError::FinalizationFailure {
                    order_id: order_id.to_string(),
                    source,
                })
            }
        }
    }
}
