//! OrderWriter - the authoring side of draft sync
//!
//! One writer per cashier session; it is the single writer of its orders.
//!
//! # Mutation Flow
//!
//! ```text
//! mutation(...)
//!     ├─ 1. Read the full current item set from the store, compute the
//!     │     new item state and recompute order totals from it
//!     ├─ 2. Persist item record(s)
//!     ├─ 3. Persist the order record (with the new totals)
//!     ├─ 4. Publish the sync message (scope derived from the saved order)
//!     └─ 5. Update the in-memory cart from the same computed values
//! ```
//!
//! Each step completes before the next starts. A reader woken by step 4
//! always finds final totals in the store. A failure in 2 or 3 aborts the
//! mutation before anything is published or the cart changes; a failure in 4
//! is logged and the mutation still succeeds.

use serde_json::json;
use shared::message::{EventKind, SyncMessage};
use shared::order::{
    CustomerRef, DraftOrder, DraftOrderItem, ItemInput, OrderStatus, OrderTotals,
};
use shared::util::now_millis;
use std::sync::Arc;

use super::error::{SyncError, SyncResult};
use super::money::{self, PricingPolicy};
use crate::broadcast::SyncChannel;
use crate::store::DraftStore;

/// In-memory cart: a read-through cache of the store
///
/// Rebuilt from store values after every successful write; never written
/// to independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub order: Option<DraftOrder>,
    pub items: Vec<DraftOrderItem>,
}

impl CartState {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn totals(&self) -> OrderTotals {
        self.order
            .as_ref()
            .map(DraftOrder::totals)
            .unwrap_or_default()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order.as_ref().map(|o| o.id.as_str())
    }

    pub fn item(&self, item_id: &str) -> Option<&DraftOrderItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Total number of units in the cart
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Item record operation of one mutation
#[derive(Debug, Clone)]
enum ItemOp {
    /// Write `item`; `previous` is the stored record it replaces, if any
    Put {
        item: DraftOrderItem,
        previous: Option<DraftOrderItem>,
    },
    Delete(DraftOrderItem),
}

/// Draft order writer for one cashier session
pub struct OrderWriter {
    store: Arc<dyn DraftStore>,
    channel: SyncChannel,
    pricing: PricingPolicy,
    cashier_id: String,
    selected_table: Option<String>,
    cart: CartState,
}

impl std::fmt::Debug for OrderWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderWriter")
            .field("store", &"<DraftStore>")
            .field("channel", &self.channel.name())
            .field("cashier_id", &self.cashier_id)
            .field("selected_table", &self.selected_table)
            .field("order_id", &self.cart.order_id())
            .finish()
    }
}

impl OrderWriter {
    pub fn new(
        store: Arc<dyn DraftStore>,
        channel: SyncChannel,
        pricing: PricingPolicy,
        cashier_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            channel,
            pricing,
            cashier_id: cashier_id.into(),
            selected_table: None,
            cart: CartState::default(),
        }
    }

    pub fn cashier_id(&self) -> &str {
        &self.cashier_id
    }

    pub fn selected_table(&self) -> Option<&str> {
        self.selected_table.as_deref()
    }

    /// Current cart snapshot
    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    // ========== Lifecycle ==========

    /// Explicitly start a draft (broadcasts `order_created`)
    ///
    /// Returns the current active draft instead if there already is one.
    pub async fn open_order(&mut self) -> SyncResult<DraftOrder> {
        if let Some(order) = self.current_order().await? {
            return Ok(order);
        }

        let (mut order, created) = self.ensure_order().await?;
        if !created {
            let items = self.store.get_items_for_order(&order.id).await?;
            self.cart = CartState {
                order: Some(order.clone()),
                items,
            };
            return Ok(order);
        }

        order.apply_totals(money::recalculate_totals(&[], &self.pricing));
        order.touch(now_millis());

        self.store
            .put_order(&order)
            .await
            .map_err(SyncError::write("order"))?;
        self.publish(EventKind::OrderCreated, &order, json!({ "status": order.status }));

        tracing::info!(order_id = %order.id, scope = %order.scope_id(), "Draft order opened");
        self.cart = CartState {
            order: Some(order.clone()),
            items: Vec::new(),
        };
        Ok(order)
    }

    /// Rebuild the cart from the store after a restart or reload
    ///
    /// Picks the selected table's active order when a table is selected,
    /// otherwise the cashier's most recent active order.
    pub async fn resume(&mut self) -> SyncResult<&CartState> {
        let order = match &self.selected_table {
            Some(table) => self
                .store
                .get_order_by_table(table)
                .await?
                .filter(|o| o.cashier_id == self.cashier_id),
            None => self
                .store
                .get_active_orders_for_cashier(&self.cashier_id)
                .await?
                .into_iter()
                .next(),
        };

        self.cart = match order {
            Some(order) => {
                let items = self.store.get_items_for_order(&order.id).await?;
                tracing::info!(order_id = %order.id, items = items.len(), "Resumed draft order");
                if self.selected_table.is_none() {
                    self.selected_table = order.table_number.clone();
                }
                CartState {
                    order: Some(order),
                    items,
                }
            }
            None => CartState::default(),
        };
        Ok(&self.cart)
    }

    /// Recompute the cart from the store
    pub async fn refresh(&mut self) -> SyncResult<&CartState> {
        self.cart = match self.current_order().await? {
            Some(order) => {
                let items = self.store.get_items_for_order(&order.id).await?;
                CartState {
                    order: Some(order),
                    items,
                }
            }
            None => CartState::default(),
        };
        Ok(&self.cart)
    }

    // ========== Item Mutations ==========

    /// Add an item to the cart
    ///
    /// Works with or without a selected table. Creates the draft on first
    /// use. An identical line (same reference, price and flags) is merged by
    /// raising its quantity, which publishes `item_updated`; otherwise a new
    /// line is created and `item_added` is published.
    pub async fn add_item(&mut self, input: ItemInput) -> SyncResult<DraftOrderItem> {
        money::validate_item_input(&input)?;

        let (order, created) = self.ensure_order().await?;
        let items = self.store.get_items_for_order(&order.id).await?;
        let now = now_millis();

        let mergeable = items.iter().find(|i| {
            i.item_ref == input.item_ref
                && i.unit_price == input.unit_price
                && i.is_vip_price == input.is_vip_price
                && i.is_complimentary == input.is_complimentary
                && (i.is_complimentary || i.line_discount == 0.0)
                && input.line_discount == 0.0
        });

        let (item, op, event) = match mergeable {
            Some(existing) => {
                let quantity = existing.quantity.saturating_add(input.quantity);
                money::validate_quantity(quantity)?;
                let mut item = existing.clone();
                item.quantity = quantity;
                item.touch(now);
                money::price_line(&mut item);
                let op = ItemOp::Put {
                    item: item.clone(),
                    previous: Some(existing.clone()),
                };
                (item, op, EventKind::ItemUpdated)
            }
            None => {
                let mut item = DraftOrderItem::new(
                    &order.id,
                    input.item_ref,
                    input.name,
                    input.unit_price,
                    input.quantity,
                );
                item.line_discount = input.line_discount;
                item.is_vip_price = input.is_vip_price;
                item.is_complimentary = input.is_complimentary;
                money::price_line(&mut item);
                let op = ItemOp::Put {
                    item: item.clone(),
                    previous: None,
                };
                (item, op, EventKind::ItemAdded)
            }
        };

        if created {
            tracing::debug!(order_id = %order.id, "Draft order created by first item");
        }

        let payload = item_payload(&item);
        self.commit(order, items, vec![op], event, payload).await?;
        Ok(item)
    }

    /// Set the quantity of a line; `0` removes it
    pub async fn update_quantity(
        &mut self,
        item_id: &str,
        quantity: u32,
    ) -> SyncResult<Option<DraftOrderItem>> {
        if quantity == 0 {
            self.remove_item(item_id).await?;
            return Ok(None);
        }
        money::validate_quantity(quantity)?;

        let order = self.require_order().await?;
        let items = self.store.get_items_for_order(&order.id).await?;
        let existing = items
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or_else(|| SyncError::ItemNotFound(item_id.to_string()))?;

        let mut item = existing.clone();
        item.quantity = quantity;
        item.touch(now_millis());
        money::price_line(&mut item);

        let payload = item_payload(&item);
        let op = ItemOp::Put {
            item: item.clone(),
            previous: Some(existing),
        };
        self.commit(order, items, vec![op], EventKind::ItemUpdated, payload)
            .await?;
        Ok(Some(item))
    }

    /// Raise a line's quantity by one
    pub async fn increment(&mut self, item_id: &str) -> SyncResult<Option<DraftOrderItem>> {
        let quantity = self.stored_quantity(item_id).await?;
        self.update_quantity(item_id, quantity.saturating_add(1)).await
    }

    /// Lower a line's quantity by one, removing it at zero
    pub async fn decrement(&mut self, item_id: &str) -> SyncResult<Option<DraftOrderItem>> {
        let quantity = self.stored_quantity(item_id).await?;
        self.update_quantity(item_id, quantity.saturating_sub(1)).await
    }

    /// Remove a line. The order itself stays, even when it becomes empty.
    pub async fn remove_item(&mut self, item_id: &str) -> SyncResult<()> {
        let order = self.require_order().await?;
        let items = self.store.get_items_for_order(&order.id).await?;
        let existing = items
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or_else(|| SyncError::ItemNotFound(item_id.to_string()))?;

        let payload = json!({ "itemId": existing.id, "name": existing.name });
        self.commit(
            order,
            items,
            vec![ItemOp::Delete(existing)],
            EventKind::ItemRemoved,
            payload,
        )
        .await
    }

    // ========== Order Mutations ==========

    /// Attach or detach the customer
    pub async fn set_customer(&mut self, customer: Option<CustomerRef>) -> SyncResult<DraftOrder> {
        let (mut order, _) = self.ensure_order().await?;
        let items = self.store.get_items_for_order(&order.id).await?;
        order.customer = customer;

        let payload = json!({ "customer": order.customer });
        self.commit(order, items, Vec::new(), EventKind::OrderUpdated, payload)
            .await?;
        self.current_cart_order()
    }

    /// Select (or clear) the table
    ///
    /// Table selection never gates adding items. When a draft already
    /// exists, all its items and the order are re-saved under the new scope
    /// right away, so a display filtering by table sees the existing lines
    /// without waiting for the next item change.
    pub async fn set_table(&mut self, table_number: Option<String>) -> SyncResult<Option<DraftOrder>> {
        let Some(mut order) = self.current_order().await? else {
            self.selected_table = table_number;
            return Ok(None);
        };

        if order.table_number == table_number {
            self.selected_table = table_number;
            return Ok(Some(order));
        }

        if let Some(table) = &table_number
            && let Some(occupant) = self.store.get_order_by_table(table).await?
            && occupant.id != order.id
        {
            return Err(SyncError::InvalidOperation(format!(
                "Table {} is already occupied (order: {})",
                table, occupant.id
            )));
        }

        let items = self.store.get_items_for_order(&order.id).await?;
        let now = now_millis();
        let ops = items
            .iter()
            .map(|existing| {
                let mut item = existing.clone();
                item.touch(now);
                ItemOp::Put {
                    item,
                    previous: Some(existing.clone()),
                }
            })
            .collect();

        let previous_scope = order.scope_id();
        order.table_number = table_number.clone();
        let payload = json!({
            "tableNumber": order.table_number,
            "previousScopeId": previous_scope,
        });
        self.commit(order, items, ops, EventKind::OrderUpdated, payload)
            .await?;
        self.selected_table = table_number;

        self.current_cart_order().map(Some)
    }

    /// `draft` → `confirmed`
    pub async fn confirm(&mut self) -> SyncResult<DraftOrder> {
        let mut order = self.require_order().await?;
        if order.status == OrderStatus::Confirmed {
            return Ok(order);
        }

        let items = self.store.get_items_for_order(&order.id).await?;
        order.status = OrderStatus::Confirmed;
        let payload = json!({ "status": order.status });
        self.commit(order, items, Vec::new(), EventKind::OrderConfirmed, payload)
            .await?;
        self.current_cart_order()
    }

    /// Cancel the draft: delete its items and the order itself
    pub async fn clear(&mut self) -> SyncResult<()> {
        let Some(order) = self.current_order().await? else {
            self.cart = CartState::default();
            return Ok(());
        };

        let items = self.store.get_items_for_order(&order.id).await?;
        self.store
            .delete_all_items_for_order(&order.id)
            .await
            .map_err(SyncError::write("items"))?;

        if let Err(source) = self.store.delete_order(&order.id).await {
            tracing::error!(order_id = %order.id, error = %source, "Order delete failed, restoring items");
            let restore: Vec<ItemOp> = items.into_iter().map(ItemOp::Delete).collect();
            self.rollback(&restore).await;
            return Err(SyncError::WriteFailure {
                record: "order",
                source,
            });
        }

        self.publish(EventKind::OrderDeleted, &order, json!({ "reason": "cleared" }));
        tracing::info!(order_id = %order.id, "Draft order cleared");
        self.cart = CartState::default();
        Ok(())
    }

    // ========== Internals ==========

    /// Fresh store read of the cart's order, if it is still active
    ///
    /// A paid or deleted order ends the cart: the next mutation starts a new
    /// draft.
    async fn current_order(&mut self) -> SyncResult<Option<DraftOrder>> {
        let Some(order_id) = self.cart.order_id().map(str::to_string) else {
            return Ok(None);
        };

        match self.store.get_order(&order_id).await? {
            Some(order) if order.is_active() => Ok(Some(order)),
            Some(order) => {
                tracing::debug!(order_id = %order.id, status = %order.status, "Cart order is terminal, starting fresh");
                self.cart = CartState::default();
                Ok(None)
            }
            None => {
                tracing::debug!(order_id = %order_id, "Cart order no longer in store");
                self.cart = CartState::default();
                Ok(None)
            }
        }
    }

    async fn require_order(&mut self) -> SyncResult<DraftOrder> {
        match self.current_order().await? {
            Some(order) => Ok(order),
            None => Err(SyncError::OrderNotFound(
                self.cart.order_id().unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Current active order, or a new unsaved draft (`true`)
    async fn ensure_order(&mut self) -> SyncResult<(DraftOrder, bool)> {
        if let Some(order) = self.current_order().await? {
            return Ok((order, false));
        }

        if let Some(table) = &self.selected_table
            && let Some(occupant) = self.store.get_order_by_table(table).await?
        {
            if occupant.cashier_id == self.cashier_id {
                return Ok((occupant, false));
            }
            return Err(SyncError::InvalidOperation(format!(
                "Table {} is already occupied (order: {})",
                table, occupant.id
            )));
        }

        Ok((
            DraftOrder::new(self.cashier_id.clone(), self.selected_table.clone()),
            true,
        ))
    }

    async fn stored_quantity(&mut self, item_id: &str) -> SyncResult<u32> {
        let order = self.require_order().await?;
        match self.store.get_item(item_id).await? {
            Some(item) if item.order_id == order.id => Ok(item.quantity),
            _ => Err(SyncError::ItemNotFound(item_id.to_string())),
        }
    }

    fn current_cart_order(&self) -> SyncResult<DraftOrder> {
        self.cart
            .order
            .clone()
            .ok_or_else(|| SyncError::OrderNotFound("<none>".to_string()))
    }

    /// Run steps 1–5 for one mutation
    ///
    /// `items` is the item set read from the store for this mutation.
    async fn commit(
        &mut self,
        mut order: DraftOrder,
        mut items: Vec<DraftOrderItem>,
        ops: Vec<ItemOp>,
        event: EventKind,
        mut payload: serde_json::Value,
    ) -> SyncResult<()> {
        // 1. New item set and totals
        for op in &ops {
            match op {
                ItemOp::Put { item, .. } => match items.iter_mut().find(|i| i.id == item.id) {
                    Some(slot) => *slot = item.clone(),
                    None => items.push(item.clone()),
                },
                ItemOp::Delete(item) => items.retain(|i| i.id != item.id),
            }
        }
        let totals = money::recalculate_totals(&items, &self.pricing);
        order.apply_totals(totals);
        order.touch(now_millis());

        // 2. Item records
        for (done, op) in ops.iter().enumerate() {
            let result = match op {
                ItemOp::Put { item, .. } => self.store.put_item(item).await,
                ItemOp::Delete(item) => self.store.delete_item(&item.id).await,
            };
            if let Err(source) = result {
                tracing::error!(order_id = %order.id, error = %source, "Item write failed, mutation aborted");
                self.rollback(&ops[..done]).await;
                return Err(SyncError::WriteFailure {
                    record: "item",
                    source,
                });
            }
        }

        // 3. Order record with final totals
        if let Err(source) = self.store.put_order(&order).await {
            tracing::error!(order_id = %order.id, error = %source, "Order write failed, mutation aborted");
            self.rollback(&ops).await;
            return Err(SyncError::WriteFailure {
                record: "order",
                source,
            });
        }

        // 4. Broadcast, scoped by the order just saved
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("totalAmount".to_string(), json!(order.total_amount));
        }
        self.publish(event, &order, payload);

        // 5. Cart
        self.cart = CartState {
            order: Some(order),
            items,
        };
        Ok(())
    }

    /// Best-effort restore of item records written before a failed step
    async fn rollback(&self, applied: &[ItemOp]) {
        for op in applied.iter().rev() {
            let result = match op {
                ItemOp::Put {
                    previous: Some(prev),
                    ..
                } => self.store.put_item(prev).await,
                ItemOp::Put { item, previous: None } => self.store.delete_item(&item.id).await,
                ItemOp::Delete(item) => self.store.put_item(item).await,
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to roll back item write");
            }
        }
    }

    fn publish(&self, event: EventKind, order: &DraftOrder, payload: serde_json::Value) {
        self.channel
            .notify(SyncMessage::new(event, &order.id, order.scope_id(), payload));
    }
}

fn item_payload(item: &DraftOrderItem) -> serde_json::Value {
    json!({
        "itemId": item.id,
        "name": item.name,
        "quantity": item.quantity,
        "subtotal": item.subtotal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::SyncSubscription;
    use crate::store::{RedbDraftStore, StoreStats};

    fn create_test_writer(cashier: &str) -> (OrderWriter, SyncSubscription, Arc<dyn DraftStore>) {
        let store: Arc<dyn DraftStore> = Arc::new(RedbDraftStore::open_in_memory().unwrap());
        let channel = SyncChannel::new("test", 64);
        let sub = channel.subscribe().unwrap();
        let writer = OrderWriter::new(store.clone(), channel, PricingPolicy::default(), cashier);
        (writer, sub, store)
    }

    #[tokio::test]
    async fn test_add_item_creates_order_without_extra_broadcast() {
        let (mut writer, mut sub, store) = create_test_writer("c1");

        let item = writer
            .add_item(ItemInput::product("p-a", "Product A", 130.0))
            .await
            .unwrap();

        let msgs = sub.drain();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].event, EventKind::ItemAdded);
        assert_eq!(msgs[0].scope_id.as_str(), "takeout_c1");

        let order = store.get_order(&item.order_id).await.unwrap().unwrap();
        assert_eq!(order.total_amount, 130.0);
        assert_eq!(writer.cart().totals().total_amount, 130.0);
    }

    #[tokio::test]
    async fn test_same_product_merges_into_one_line() {
        let (mut writer, mut sub, store) = create_test_writer("c1");
        let first = writer
            .add_item(ItemInput::product("p-a", "Product A", 130.0))
            .await
            .unwrap();
        let second = writer
            .add_item(ItemInput::product("p-a", "Product A", 130.0))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 2);

        let events: Vec<EventKind> = sub.drain().into_iter().map(|m| m.event).collect();
        assert_eq!(events, vec![EventKind::ItemAdded, EventKind::ItemUpdated]);

        let items = store.get_items_for_order(&first.order_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            store.get_order(&first.order_id).await.unwrap().unwrap().total_amount,
            260.0
        );
    }

    #[tokio::test]
    async fn test_different_price_flags_do_not_merge() {
        let (mut writer, _sub, _store) = create_test_writer("c1");
        writer
            .add_item(ItemInput::product("p-a", "Product A", 130.0))
            .await
            .unwrap();
        writer
            .add_item(ItemInput::product("p-a", "Product A", 110.0).vip())
            .await
            .unwrap();
        writer
            .add_item(ItemInput::product("p-a", "Product A", 130.0).complimentary())
            .await
            .unwrap();

        assert_eq!(writer.cart().items.len(), 3);
        let totals = writer.cart().totals();
        assert_eq!(totals.subtotal, 370.0);
        assert_eq!(totals.discount_amount, 130.0);
        assert_eq!(totals.total_amount, 240.0);
    }

    #[tokio::test]
    async fn test_complimentary_lines_merge() {
        let (mut writer, mut sub, _store) = create_test_writer("c1");
        let first = writer
            .add_item(ItemInput::product("p-a", "Product A", 130.0).complimentary())
            .await
            .unwrap();
        let second = writer
            .add_item(ItemInput::product("p-a", "Product A", 130.0).complimentary())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 2);
        assert_eq!(second.line_discount, 260.0);
        assert_eq!(writer.cart().items.len(), 1);
        assert_eq!(writer.cart().totals().total_amount, 0.0);

        let events: Vec<EventKind> = sub.drain().into_iter().map(|m| m.event).collect();
        assert_eq!(events, vec![EventKind::ItemAdded, EventKind::ItemUpdated]);
    }

    #[tokio::test]
    async fn test_quantity_updates_broadcast() {
        let (mut writer, mut sub, _store) = create_test_writer("c1");
        let item = writer
            .add_item(ItemInput::product("p-a", "Product A", 10.0))
            .await
            .unwrap();

        writer.increment(&item.id).await.unwrap();
        writer.update_quantity(&item.id, 5).await.unwrap();
        writer.decrement(&item.id).await.unwrap();

        let events: Vec<EventKind> = sub.drain().into_iter().map(|m| m.event).collect();
        assert_eq!(
            events,
            vec![
                EventKind::ItemAdded,
                EventKind::ItemUpdated,
                EventKind::ItemUpdated,
                EventKind::ItemUpdated
            ]
        );
        assert_eq!(writer.cart().items[0].quantity, 4);
        assert_eq!(writer.cart().totals().total_amount, 40.0);
    }

    #[tokio::test]
    async fn test_quantity_zero_removes_and_keeps_order() {
        let (mut writer, mut sub, store) = create_test_writer("c1");
        let item = writer
            .add_item(ItemInput::product("p-a", "Product A", 10.0))
            .await
            .unwrap();

        let result = writer.update_quantity(&item.id, 0).await.unwrap();
        assert!(result.is_none());

        let events: Vec<EventKind> = sub.drain().into_iter().map(|m| m.event).collect();
        assert_eq!(events, vec![EventKind::ItemAdded, EventKind::ItemRemoved]);

        let order = store.get_order(&item.order_id).await.unwrap().unwrap();
        assert!(order.is_active());
        assert_eq!(order.total_amount, 0.0);
        assert!(writer.cart().is_empty());
        assert!(writer.cart().order.is_some());
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let (mut writer, _sub, _store) = create_test_writer("c1");
        writer
            .add_item(ItemInput::product("p-a", "Product A", 10.0))
            .await
            .unwrap();
        let err = writer.update_quantity("nope", 2).await.unwrap_err();
        assert!(matches!(err, SyncError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_input_touches_nothing() {
        let (mut writer, mut sub, store) = create_test_writer("c1");
        let err = writer
            .add_item(ItemInput::product("p-a", "Product A", -5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidOperation(_)));
        assert!(sub.drain().is_empty());
        assert_eq!(store.stats().await.unwrap().orders, 0);
        assert!(writer.cart().order.is_none());
    }

    #[tokio::test]
    async fn test_open_order_then_add() {
        let (mut writer, mut sub, _store) = create_test_writer("c1");
        let order = writer.open_order().await.unwrap();
        let again = writer.open_order().await.unwrap();
        assert_eq!(order.id, again.id);

        writer
            .add_item(ItemInput::package("combo", "Family Combo", 499.0))
            .await
            .unwrap();

        let events: Vec<EventKind> = sub.drain().into_iter().map(|m| m.event).collect();
        assert_eq!(events, vec![EventKind::OrderCreated, EventKind::ItemAdded]);
        assert!(writer.cart().items[0].item_ref.is_package());
    }

    #[tokio::test]
    async fn test_confirm_and_customer() {
        let (mut writer, mut sub, store) = create_test_writer("c1");
        writer
            .add_item(ItemInput::product("p-a", "Product A", 10.0))
            .await
            .unwrap();
        writer
            .set_customer(Some(CustomerRef::new("cust-1").with_name("Ana")))
            .await
            .unwrap();
        let order = writer.confirm().await.unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        let stored = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.customer.unwrap().id, "cust-1");

        let events: Vec<EventKind> = sub.drain().into_iter().map(|m| m.event).collect();
        assert_eq!(
            events,
            vec![
                EventKind::ItemAdded,
                EventKind::OrderUpdated,
                EventKind::OrderConfirmed
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_deletes_everything() {
        let (mut writer, mut sub, store) = create_test_writer("c1");
        writer
            .add_item(ItemInput::product("p-a", "Product A", 10.0))
            .await
            .unwrap();
        writer
            .add_item(ItemInput::product("p-b", "Product B", 12.0))
            .await
            .unwrap();

        writer.clear().await.unwrap();

        let msgs = sub.drain();
        assert_eq!(msgs.last().unwrap().event, EventKind::OrderDeleted);
        assert_eq!(store.stats().await.unwrap(), StoreStats::default());
        assert_eq!(writer.cart(), &CartState::default());
    }

    #[tokio::test]
    async fn test_set_table_resyncs_existing_items() {
        let (mut writer, mut sub, store) = create_test_writer("c1");
        for (id, name) in [("a", "A"), ("b", "B"), ("c", "C")] {
            writer
                .add_item(ItemInput::product(id, name, 5.0))
                .await
                .unwrap();
        }
        sub.drain();

        let order = writer.set_table(Some("7".to_string())).await.unwrap().unwrap();
        assert_eq!(order.table_number.as_deref(), Some("7"));

        let msgs = sub.drain();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].event, EventKind::OrderUpdated);
        assert_eq!(msgs[0].scope_id.as_str(), "7");

        let by_table = store.get_order_by_table("7").await.unwrap().unwrap();
        assert_eq!(store.get_items_for_order(&by_table.id).await.unwrap().len(), 3);
        assert_eq!(by_table.total_amount, 15.0);
    }

    #[tokio::test]
    async fn test_set_table_without_order_only_selects() {
        let (mut writer, mut sub, _store) = create_test_writer("c1");
        assert!(writer.set_table(Some("3".to_string())).await.unwrap().is_none());
        assert!(sub.drain().is_empty());

        let item = writer
            .add_item(ItemInput::product("p", "P", 1.0))
            .await
            .unwrap();
        assert_eq!(
            writer.cart().order.as_ref().unwrap().table_number.as_deref(),
            Some("3")
        );
        assert_eq!(item.quantity, 1);
    }

    #[tokio::test]
    async fn test_table_occupied_by_other_cashier() {
        let store: Arc<dyn DraftStore> = Arc::new(RedbDraftStore::open_in_memory().unwrap());
        let channel = SyncChannel::new("test", 64);
        let mut alice = OrderWriter::new(store.clone(), channel.clone(), PricingPolicy::default(), "alice");
        let mut bob = OrderWriter::new(store, channel, PricingPolicy::default(), "bob");

        alice.set_table(Some("1".to_string())).await.unwrap();
        alice.add_item(ItemInput::product("p", "P", 1.0)).await.unwrap();

        bob.add_item(ItemInput::product("p", "P", 1.0)).await.unwrap();
        let err = bob.set_table(Some("1".to_string())).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidOperation(_)));
        assert!(bob.cart().order.as_ref().unwrap().table_number.is_none());
    }

    #[tokio::test]
    async fn test_resume_after_restart() {
        let (mut writer, _sub, store) = create_test_writer("c1");
        writer
            .add_item(ItemInput::product("p-a", "Product A", 10.0).with_quantity(3))
            .await
            .unwrap();
        let order_id = writer.cart().order_id().unwrap().to_string();

        let mut reloaded = OrderWriter::new(
            store,
            SyncChannel::new("test", 8),
            PricingPolicy::default(),
            "c1",
        );
        let cart = reloaded.resume().await.unwrap();
        assert_eq!(cart.order_id(), Some(order_id.as_str()));
        assert_eq!(cart.unit_count(), 3);
    }

    #[tokio::test]
    async fn test_works_without_broadcast() {
        let store: Arc<dyn DraftStore> = Arc::new(RedbDraftStore::open_in_memory().unwrap());
        let mut writer = OrderWriter::new(
            store.clone(),
            SyncChannel::unavailable("test"),
            PricingPolicy::default(),
            "c1",
        );
        let item = writer
            .add_item(ItemInput::product("p", "P", 2.5))
            .await
            .unwrap();
        let order = store.get_order(&item.order_id).await.unwrap().unwrap();
        assert_eq!(order.total_amount, 2.5);
    }
}
