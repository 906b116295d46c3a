//! redb-based draft store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `draft_orders` | `order_id` | `DraftOrder` (JSON) | Order records |
//! | `draft_items` | `item_id` | `DraftOrderItem` (JSON) | Item records |
//! | `order_items` | `order_id` | `item_id` (multimap) | Items per order |
//!
//! # Durability
//!
//! Every operation runs in its own write transaction; a write is durable as
//! soon as `commit()` returns. redb operations are synchronous for stability,
//! the async trait only marks the suspension points for callers.

use async_trait::async_trait;
use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition,
};
use shared::order::{DraftOrder, DraftOrderItem};
use std::path::Path;
use std::sync::Arc;

use super::{DraftStore, StoreError, StoreResult, StoreStats, sort_cart_order, sort_newest_first};

/// Table for order records: key = order_id, value = JSON-serialized DraftOrder
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("draft_orders");

/// Table for item records: key = item_id, value = JSON-serialized DraftOrderItem
const ITEMS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("draft_items");

/// Index of items per order: key = order_id, values = item_id
const ORDER_ITEMS_TABLE: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("order_items");

/// Draft store backed by redb
#[derive(Clone)]
pub struct RedbDraftStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbDraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDraftStore").finish_non_exhaustive()
    }
}

impl RedbDraftStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path).map_err(StoreError::unavailable)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(StoreError::unavailable)?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write().map_err(StoreError::unavailable)?;
        {
            let _ = write_txn
                .open_table(ORDERS_TABLE)
                .map_err(StoreError::unavailable)?;
            let _ = write_txn
                .open_table(ITEMS_TABLE)
                .map_err(StoreError::unavailable)?;
            let _ = write_txn
                .open_multimap_table(ORDER_ITEMS_TABLE)
                .map_err(StoreError::unavailable)?;
        }
        write_txn.commit().map_err(StoreError::unavailable)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn read_orders(&self) -> StoreResult<Vec<DraftOrder>> {
        let read_txn = self.db.begin_read().map_err(StoreError::read)?;
        let table = read_txn.open_table(ORDERS_TABLE).map_err(StoreError::read)?;

        let mut orders = Vec::new();
        for result in table.iter().map_err(StoreError::read)? {
            let (_key, value) = result.map_err(StoreError::read)?;
            orders.push(serde_json::from_slice::<DraftOrder>(value.value())?);
        }
        Ok(orders)
    }

    fn read_item(&self, id: &str) -> StoreResult<Option<DraftOrderItem>> {
        let read_txn = self.db.begin_read().map_err(StoreError::read)?;
        let table = read_txn.open_table(ITEMS_TABLE).map_err(StoreError::read)?;
        match table.get(id).map_err(StoreError::read)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DraftStore for RedbDraftStore {
    async fn put_order(&self, order: &DraftOrder) -> StoreResult<()> {
        let value = serde_json::to_vec(order)?;
        let txn = self.db.begin_write().map_err(StoreError::write)?;
        {
            let mut table = txn.open_table(ORDERS_TABLE).map_err(StoreError::write)?;
            table
                .insert(order.id.as_str(), value.as_slice())
                .map_err(StoreError::write)?;
        }
        txn.commit().map_err(StoreError::write)?;
        Ok(())
    }

    async fn get_order(&self, id: &str) -> StoreResult<Option<DraftOrder>> {
        let read_txn = self.db.begin_read().map_err(StoreError::read)?;
        let table = read_txn.open_table(ORDERS_TABLE).map_err(StoreError::read)?;
        match table.get(id).map_err(StoreError::read)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn get_order_by_table(&self, table_number: &str) -> StoreResult<Option<DraftOrder>> {
        let mut orders: Vec<DraftOrder> = self
            .read_orders()?
            .into_iter()
            .filter(|o| o.is_active() && o.table_number.as_deref() == Some(table_number))
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders.into_iter().next())
    }

    async fn get_all_active_orders(&self) -> StoreResult<Vec<DraftOrder>> {
        let mut orders: Vec<DraftOrder> = self
            .read_orders()?
            .into_iter()
            .filter(DraftOrder::is_active)
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn get_all_orders(&self) -> StoreResult<Vec<DraftOrder>> {
        let mut orders = self.read_orders()?;
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn delete_order(&self, id: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(StoreError::write)?;
        {
            let mut table = txn.open_table(ORDERS_TABLE).map_err(StoreError::write)?;
            table.remove(id).map_err(StoreError::write)?;
        }
        txn.commit().map_err(StoreError::write)?;
        Ok(())
    }

    async fn put_item(&self, item: &DraftOrderItem) -> StoreResult<()> {
        let value = serde_json::to_vec(item)?;
        let txn = self.db.begin_write().map_err(StoreError::write)?;
        {
            let mut items = txn.open_table(ITEMS_TABLE).map_err(StoreError::write)?;
            let mut index = txn
                .open_multimap_table(ORDER_ITEMS_TABLE)
                .map_err(StoreError::write)?;

            // An item never changes owner, but keep the index exact if it does
            let previous_owner = match items.get(item.id.as_str()).map_err(StoreError::write)? {
                Some(guard) => {
                    let prev: DraftOrderItem = serde_json::from_slice(guard.value())?;
                    Some(prev.order_id)
                }
                None => None,
            };
            if let Some(owner) = previous_owner
                && owner != item.order_id
            {
                index
                    .remove(owner.as_str(), item.id.as_str())
                    .map_err(StoreError::write)?;
            }

            items
                .insert(item.id.as_str(), value.as_slice())
                .map_err(StoreError::write)?;
            index
                .insert(item.order_id.as_str(), item.id.as_str())
                .map_err(StoreError::write)?;
        }
        txn.commit().map_err(StoreError::write)?;
        Ok(())
    }

    async fn get_item(&self, id: &str) -> StoreResult<Option<DraftOrderItem>> {
        self.read_item(id)
    }

    async fn get_items_for_order(&self, order_id: &str) -> StoreResult<Vec<DraftOrderItem>> {
        let read_txn = self.db.begin_read().map_err(StoreError::read)?;
        let index = read_txn
            .open_multimap_table(ORDER_ITEMS_TABLE)
            .map_err(StoreError::read)?;
        let table = read_txn.open_table(ITEMS_TABLE).map_err(StoreError::read)?;

        let mut items = Vec::new();
        for item_id in index.get(order_id).map_err(StoreError::read)? {
            let item_id = item_id.map_err(StoreError::read)?;
            if let Some(guard) = table.get(item_id.value()).map_err(StoreError::read)? {
                items.push(serde_json::from_slice::<DraftOrderItem>(guard.value())?);
            }
        }

        sort_cart_order(&mut items);
        Ok(items)
    }

    async fn delete_item(&self, id: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(StoreError::write)?;
        {
            let mut items = txn.open_table(ITEMS_TABLE).map_err(StoreError::write)?;
            let removed = items.remove(id).map_err(StoreError::write)?;
            if let Some(guard) = removed {
                let item: DraftOrderItem = serde_json::from_slice(guard.value())?;
                drop(guard);
                let mut index = txn
                    .open_multimap_table(ORDER_ITEMS_TABLE)
                    .map_err(StoreError::write)?;
                index
                    .remove(item.order_id.as_str(), id)
                    .map_err(StoreError::write)?;
            }
        }
        txn.commit().map_err(StoreError::write)?;
        Ok(())
    }

    async fn delete_all_items_for_order(&self, order_id: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(StoreError::write)?;
        {
            let mut index = txn
                .open_multimap_table(ORDER_ITEMS_TABLE)
                .map_err(StoreError::write)?;
            let mut item_ids = Vec::new();
            for item_id in index.remove_all(order_id).map_err(StoreError::write)? {
                item_ids.push(item_id.map_err(StoreError::write)?.value().to_string());
            }

            let mut items = txn.open_table(ITEMS_TABLE).map_err(StoreError::write)?;
            for item_id in &item_ids {
                items.remove(item_id.as_str()).map_err(StoreError::write)?;
            }
        }
        txn.commit().map_err(StoreError::write)?;
        Ok(())
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let orders = self.read_orders()?;
        let read_txn = self.db.begin_read().map_err(StoreError::read)?;
        let items = read_txn.open_table(ITEMS_TABLE).map_err(StoreError::read)?;
        Ok(StoreStats {
            orders: orders.len(),
            active_orders: orders.iter().filter(|o| o.is_active()).count(),
            items: items.len().map_err(StoreError::read)? as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{ItemRef, OrderStatus};

    fn create_test_order(cashier: &str, table: Option<&str>, created_at: i64) -> DraftOrder {
        let mut order = DraftOrder::new(cashier, table.map(str::to_string));
        order.created_at = created_at;
        order.updated_at = created_at;
        order
    }

    fn create_test_item(order_id: &str, name: &str, created_at: i64) -> DraftOrderItem {
        let mut item = DraftOrderItem::new(order_id, ItemRef::product(name), name, 10.0, 1);
        item.subtotal = 10.0;
        item.created_at = created_at;
        item
    }

    #[tokio::test]
    async fn test_order_put_get_overwrite() {
        let store = RedbDraftStore::open_in_memory().unwrap();
        let mut order = create_test_order("c1", None, 1);
        store.put_order(&order).await.unwrap();

        order.total_amount = 42.0;
        store.put_order(&order).await.unwrap();

        let loaded = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_amount, 42.0);
        assert!(store.get_order("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_active_orders_exclude_paid() {
        let store = RedbDraftStore::open_in_memory().unwrap();
        let older = create_test_order("c1", Some("3"), 100);
        let newer = create_test_order("c2", None, 200);
        let mut paid = create_test_order("c1", Some("3"), 300);
        paid.status = OrderStatus::Paid;

        for o in [&older, &newer, &paid] {
            store.put_order(o).await.unwrap();
        }

        let active = store.get_all_active_orders().await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, newer.id);
        assert_eq!(active[1].id, older.id);

        let by_table = store.get_order_by_table("3").await.unwrap().unwrap();
        assert_eq!(by_table.id, older.id);

        let for_c1 = store.get_active_orders_for_cashier("c1").await.unwrap();
        assert_eq!(for_c1.len(), 1);

        assert_eq!(store.get_all_orders().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_items_per_order() {
        let store = RedbDraftStore::open_in_memory().unwrap();
        let a = create_test_order("c1", None, 1);
        let b = create_test_order("c2", None, 2);

        let a2 = create_test_item(&a.id, "second", 20);
        let a1 = create_test_item(&a.id, "first", 10);
        let b1 = create_test_item(&b.id, "other", 5);
        for item in [&a2, &a1, &b1] {
            store.put_item(item).await.unwrap();
        }

        let items = store.get_items_for_order(&a.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "first");
        assert_eq!(items[1].name, "second");

        store.delete_item(&a1.id).await.unwrap();
        assert_eq!(store.get_items_for_order(&a.id).await.unwrap().len(), 1);
        assert!(store.get_item(&a1.id).await.unwrap().is_none());

        // Deleting a missing item is a no-op
        store.delete_item("missing").await.unwrap();

        store.delete_all_items_for_order(&a.id).await.unwrap();
        assert!(store.get_items_for_order(&a.id).await.unwrap().is_empty());
        assert_eq!(store.get_items_for_order(&b.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_item_overwrite_keeps_single_index_entry() {
        let store = RedbDraftStore::open_in_memory().unwrap();
        let order = create_test_order("c1", None, 1);
        let mut item = create_test_item(&order.id, "coffee", 1);
        store.put_item(&item).await.unwrap();

        item.quantity = 3;
        store.put_item(&item).await.unwrap();

        let items = store.get_items_for_order(&order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drafts.redb");
        let order = create_test_order("c1", Some("9"), 1);
        let item = create_test_item(&order.id, "tea", 1);
        {
            let store = RedbDraftStore::open(&path).unwrap();
            store.put_order(&order).await.unwrap();
            store.put_item(&item).await.unwrap();
        }

        let store = RedbDraftStore::open(&path).unwrap();
        assert_eq!(store.get_order(&order.id).await.unwrap(), Some(order.clone()));
        assert_eq!(store.get_items_for_order(&order.id).await.unwrap(), vec![item]);

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            StoreStats {
                orders: 1,
                active_orders: 1,
                items: 1
            }
        );
    }
}
