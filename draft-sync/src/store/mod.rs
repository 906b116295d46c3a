//! Local durable store for draft orders and draft items
//!
//! The store is the only owner of draft state. Everything else (cart state,
//! display projections) is a read-through cache rebuilt from it.
//!
//! # Backends
//!
//! | Backend | Persistence | When |
//! |---------|-------------|------|
//! | [`RedbDraftStore`] | redb file, survives restart | default |
//! | [`MemoryDraftStore`] | process memory only | durable store cannot be opened |
//!
//! All writes replace the full record (last writer wins). Callers do
//! read-modify-write on whole records; there are no field patches here.

mod memory;
mod redb_store;

pub use memory::MemoryDraftStore;
pub use redb_store::RedbDraftStore;

use async_trait::async_trait;
use shared::order::{DraftOrder, DraftOrderItem};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store not supported or not accessible in this context
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Write rejected (quota, corruption, commit failure)
    #[error("Write rejected: {0}")]
    Write(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn unavailable(e: impl fmt::Display) -> Self {
        StoreError::Unavailable(e.to_string())
    }

    pub(crate) fn write(e: impl fmt::Display) -> Self {
        StoreError::Write(e.to_string())
    }

    pub(crate) fn read(e: impl fmt::Display) -> Self {
        StoreError::Read(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Record counts, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub orders: usize,
    pub active_orders: usize,
    pub items: usize,
}

/// Contract of the local durable store
///
/// Every call may suspend. A write has either fully completed or failed
/// when the returned future resolves.
#[async_trait]
pub trait DraftStore: Send + Sync {
    // ========== Orders ==========

    async fn put_order(&self, order: &DraftOrder) -> StoreResult<()>;

    async fn get_order(&self, id: &str) -> StoreResult<Option<DraftOrder>>;

    /// Active (non-paid) order on a table, most recent first
    async fn get_order_by_table(&self, table_number: &str) -> StoreResult<Option<DraftOrder>>;

    /// All active orders, newest `created_at` first
    async fn get_all_active_orders(&self) -> StoreResult<Vec<DraftOrder>>;

    /// Every order regardless of status (retention sweeps)
    async fn get_all_orders(&self) -> StoreResult<Vec<DraftOrder>>;

    async fn delete_order(&self, id: &str) -> StoreResult<()>;

    // ========== Items ==========

    async fn put_item(&self, item: &DraftOrderItem) -> StoreResult<()>;

    async fn get_item(&self, id: &str) -> StoreResult<Option<DraftOrderItem>>;

    /// Items of an order, oldest first
    async fn get_items_for_order(&self, order_id: &str) -> StoreResult<Vec<DraftOrderItem>>;

    async fn delete_item(&self, id: &str) -> StoreResult<()>;

    async fn delete_all_items_for_order(&self, order_id: &str) -> StoreResult<()>;

    // ========== Derived queries ==========

    /// Active orders of one cashier, newest first
    async fn get_active_orders_for_cashier(&self, cashier_id: &str) -> StoreResult<Vec<DraftOrder>> {
        Ok(self
            .get_all_active_orders()
            .await?
            .into_iter()
            .filter(|o| o.cashier_id == cashier_id)
            .collect())
    }

    async fn stats(&self) -> StoreResult<StoreStats>;
}

/// Sort orders newest first, tie-broken by id for a stable order
pub(crate) fn sort_newest_first(orders: &mut [DraftOrder]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Sort items oldest first (cart line order)
pub(crate) fn sort_cart_order(items: &mut [DraftOrderItem]) {
    items.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Result of opening the local store
pub struct OpenedStore {
    pub store: Arc<dyn DraftStore>,
    /// `false` when running on the memory fallback
    pub durable: bool,
}

/// Open the redb store at `path`, degrading to memory-only on failure
///
/// Degradation is decided once here; callers never see per-operation
/// `Unavailable` errors afterwards.
pub fn open_store(path: impl AsRef<Path>) -> OpenedStore {
    let path = path.as_ref();
    match RedbDraftStore::open(path) {
        Ok(store) => {
            tracing::info!(path = %path.display(), "Draft store opened");
            OpenedStore {
                store: Arc::new(store),
                durable: true,
            }
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Durable draft store unavailable, running memory-only (no reload persistence, no cross-surface sync)"
            );
            OpenedStore {
                store: Arc::new(MemoryDraftStore::new()),
                durable: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A directory is not a valid database file
        let opened = open_store(dir.path());
        assert!(!opened.durable);
    }

    #[test]
    fn test_open_store_durable() {
        let dir = tempfile::tempdir().unwrap();
        let opened = open_store(dir.path().join("drafts.redb"));
        assert!(opened.durable);
    }
}
