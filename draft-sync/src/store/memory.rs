//! Memory-only draft store
//!
//! Fallback when the durable store cannot be opened. Nothing survives a
//! restart, and nothing is visible to other processes.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared::order::{DraftOrder, DraftOrderItem};
use std::collections::HashMap;

use super::{DraftStore, StoreResult, StoreStats, sort_cart_order, sort_newest_first};

#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    orders: RwLock<HashMap<String, DraftOrder>>,
    items: RwLock<HashMap<String, DraftOrderItem>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn put_order(&self, order: &DraftOrder) -> StoreResult<()> {
        self.orders.write().insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn get_order(&self, id: &str) -> StoreResult<Option<DraftOrder>> {
        Ok(self.orders.read().get(id).cloned())
    }

    async fn get_order_by_table(&self, table_number: &str) -> StoreResult<Option<DraftOrder>> {
        let mut orders: Vec<DraftOrder> = self
            .orders
            .read()
            .values()
            .filter(|o| o.is_active() && o.table_number.as_deref() == Some(table_number))
            .cloned()
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders.into_iter().next())
    }

    async fn get_all_active_orders(&self) -> StoreResult<Vec<DraftOrder>> {
        let mut orders: Vec<DraftOrder> = self
            .orders
            .read()
            .values()
            .filter(|o| o.is_active())
            .cloned()
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn get_all_orders(&self) -> StoreResult<Vec<DraftOrder>> {
        let mut orders: Vec<DraftOrder> = self.orders.read().values().cloned().collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn delete_order(&self, id: &str) -> StoreResult<()> {
        self.orders.write().remove(id);
        Ok(())
    }

    async fn put_item(&self, item: &DraftOrderItem) -> StoreResult<()> {
        self.items.write().insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn get_item(&self, id: &str) -> StoreResult<Option<DraftOrderItem>> {
        Ok(self.items.read().get(id).cloned())
    }

    async fn get_items_for_order(&self, order_id: &str) -> StoreResult<Vec<DraftOrderItem>> {
        let mut items: Vec<DraftOrderItem> = self
            .items
            .read()
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        sort_cart_order(&mut items);
        Ok(items)
    }

    async fn delete_item(&self, id: &str) -> StoreResult<()> {
        self.items.write().remove(id);
        Ok(())
    }

    async fn delete_all_items_for_order(&self, order_id: &str) -> StoreResult<()> {
        self.items.write().retain(|_, i| i.order_id != order_id);
        Ok(())
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let orders = self.orders.read();
        Ok(StoreStats {
            orders: orders.len(),
            active_orders: orders.values().filter(|o| o.is_active()).count(),
            items: self.items.read().len(),
        })
    }
}
