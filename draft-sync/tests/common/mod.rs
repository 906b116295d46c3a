//! 测试辅助 - 可注入写入失败的 store

#![allow(dead_code)]

use async_trait::async_trait;
use draft_sync::store::{DraftStore, MemoryDraftStore, StoreError, StoreResult, StoreStats};
use draft_sync::{Config, SyncCore};
use shared::order::{DraftOrder, DraftOrderItem};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Memory store whose item/order writes can be made to fail
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryDraftStore,
    fail_item_writes: AtomicBool,
    fail_order_writes: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_item_writes(&self, fail: bool) {
        self.fail_item_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_order_writes(&self, fail: bool) {
        self.fail_order_writes.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Write(format!("injected {what} write failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl DraftStore for FaultyStore {
    async fn put_order(&self, order: &DraftOrder) -> StoreResult<()> {
        Self::check(&self.fail_order_writes, "order")?;
        self.inner.put_order(order).await
    }

    async fn get_order(&self, id: &str) -> StoreResult<Option<DraftOrder>> {
        self.inner.get_order(id).await
    }

    async fn get_order_by_table(&self, table_number: &str) -> StoreResult<Option<DraftOrder>> {
        self.inner.get_order_by_table(table_number).await
    }

    async fn get_all_active_orders(&self) -> StoreResult<Vec<DraftOrder>> {
        self.inner.get_all_active_orders().await
    }

    async fn get_all_orders(&self) -> StoreResult<Vec<DraftOrder>> {
        self.inner.get_all_orders().await
    }

    async fn delete_order(&self, id: &str) -> StoreResult<()> {
        Self::check(&self.fail_order_writes, "order")?;
        self.inner.delete_order(id).await
    }

    async fn put_item(&self, item: &DraftOrderItem) -> StoreResult<()> {
        Self::check(&self.fail_item_writes, "item")?;
        self.inner.put_item(item).await
    }

    async fn get_item(&self, id: &str) -> StoreResult<Option<DraftOrderItem>> {
        self.inner.get_item(id).await
    }

    async fn get_items_for_order(&self, order_id: &str) -> StoreResult<Vec<DraftOrderItem>> {
        self.inner.get_items_for_order(order_id).await
    }

    async fn delete_item(&self, id: &str) -> StoreResult<()> {
        Self::check(&self.fail_item_writes, "item")?;
        self.inner.delete_item(id).await
    }

    async fn delete_all_items_for_order(&self, order_id: &str) -> StoreResult<()> {
        Self::check(&self.fail_item_writes, "item")?;
        self.inner.delete_all_items_for_order(order_id).await
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        self.inner.stats().await
    }
}

/// Config for tests: broadcast on, short timers, no remote API
pub fn test_config() -> Config {
    let mut config = Config::with_overrides("./target/draft-sync-test");
    config.broadcast_enabled = true;
    config.sync_channel_capacity = 256;
    config.paid_retention_ms = 50;
    config.celebration_ms = 100;
    config.tax_rate_percent = 0.0;
    config.finalize_api_url = None;
    config
}

/// SyncCore on the redb in-memory backend
pub fn memory_core() -> SyncCore {
    let store = draft_sync::RedbDraftStore::open_in_memory().expect("in-memory redb");
    SyncCore::with_store(&test_config(), Arc::new(store), true)
}
