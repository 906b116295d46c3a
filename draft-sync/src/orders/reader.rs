//! OrderProjector - the display side of draft sync
//!
//! A projector never trusts message payloads. Any accepted message only
//! triggers a re-read of the order and its items from the store, so
//! duplicates, reordering and dropped messages all converge on the stored
//! state.
//!
//! ```text
//! Loading ──resolve──▶ Active(view) ◀──refresh──┐
//!    │                     │                     │
//!    └─────▶ Idle ◀────────┤ order deleted       │
//!              ▲           │ order paid          │
//!              │           ▼                     │
//!              └──── PaymentCelebration ─────────┘
//!                  (deadline, then re-resolve)
//! ```

use shared::message::SyncMessage;
use shared::order::{DisplayScope, DraftOrder, DraftOrderItem, OrderStatus, OrderTotals};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::scope::{self, ListenScope};
use crate::broadcast::{Recv, SyncSubscription};
use crate::store::{DraftStore, StoreResult};

pub const DEFAULT_CELEBRATION: Duration = Duration::from_secs(3);

/// Snapshot of one order as a display shows it
#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
    pub order: DraftOrder,
    pub items: Vec<DraftOrderItem>,
    pub totals: OrderTotals,
    /// Item ids not present in the previous view of the same order
    pub newly_added: Vec<String>,
    /// Auto-detect only: other active orders that could have been shown
    pub ambiguous_candidates: Vec<String>,
}

impl OrderView {
    /// The display guessed between several active orders
    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous_candidates.is_empty()
    }

    fn build(
        order: DraftOrder,
        items: Vec<DraftOrderItem>,
        previous: Option<&OrderView>,
        ambiguous_candidates: Vec<String>,
    ) -> Self {
        let newly_added = match previous {
            Some(prev) if prev.order.id == order.id => {
                let known: HashSet<&str> = prev.items.iter().map(|i| i.id.as_str()).collect();
                items
                    .iter()
                    .filter(|i| !known.contains(i.id.as_str()))
                    .map(|i| i.id.clone())
                    .collect()
            }
            _ => Vec::new(),
        };

        Self {
            totals: order.totals(),
            order,
            items,
            newly_added,
            ambiguous_candidates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisplayState {
    /// No active order in scope
    #[default]
    Idle,
    /// Waiting for the first store read
    Loading,
    Active(OrderView),
    /// Order was just paid; shown until the celebration deadline
    PaymentCelebration(OrderView),
}

impl DisplayState {
    pub fn view(&self) -> Option<&OrderView> {
        match self {
            DisplayState::Active(view) | DisplayState::PaymentCelebration(view) => Some(view),
            DisplayState::Idle | DisplayState::Loading => None,
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        self.view().map(|v| v.order.id.as_str())
    }

    pub fn is_celebrating(&self) -> bool {
        matches!(self, DisplayState::PaymentCelebration(_))
    }
}

/// Read-only projection of one display scope
pub struct OrderProjector {
    store: Arc<dyn DraftStore>,
    scope: DisplayScope,
    listen: ListenScope,
    celebration: Duration,
    celebration_deadline: Option<Instant>,
    state_tx: watch::Sender<DisplayState>,
}

impl std::fmt::Debug for OrderProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderProjector")
            .field("scope", &self.scope)
            .field("celebration", &self.celebration)
            .field("order_id", &self.state_tx.borrow().order_id())
            .finish()
    }
}

impl OrderProjector {
    pub fn new(store: Arc<dyn DraftStore>, scope: DisplayScope, celebration: Duration) -> Self {
        let (state_tx, _) = watch::channel(DisplayState::Loading);
        Self {
            store,
            listen: ListenScope::for_display(&scope),
            scope,
            celebration,
            celebration_deadline: None,
            state_tx,
        }
    }

    pub fn scope(&self) -> &DisplayScope {
        &self.scope
    }

    pub fn state(&self) -> DisplayState {
        self.state_tx.borrow().clone()
    }

    /// Receiver for UI binding; always holds the latest state
    pub fn watch(&self) -> watch::Receiver<DisplayState> {
        self.state_tx.subscribe()
    }

    fn current_order_id(&self) -> Option<String> {
        self.state_tx.borrow().order_id().map(str::to_string)
    }

    fn set_state(&self, state: DisplayState) {
        self.state_tx.send_replace(state);
    }

    /// Auto mode: the other active orders besides `order_id`
    async fn other_candidates(&self, order_id: &str) -> StoreResult<Vec<String>> {
        if self.scope != DisplayScope::Auto {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .get_all_active_orders()
            .await?
            .into_iter()
            .filter(|o| o.id != order_id)
            .map(|o| o.id)
            .collect())
    }

    /// Re-read the projected order from the store
    ///
    /// The only way the display state changes besides the celebration
    /// deadline. A paid order starts the celebration; a deleted order, or
    /// one that left the scope, makes the projector resolve its scope again.
    pub async fn refresh(&mut self) -> StoreResult<DisplayState> {
        if self.celebration_deadline.is_some() {
            return Ok(self.state());
        }

        let previous = self.state();

        if let Some(order_id) = previous.order_id() {
            match self.store.get_order(order_id).await? {
                Some(order) if order.status == OrderStatus::Paid => {
                    let items = self.store.get_items_for_order(&order.id).await?;
                    let candidates = previous
                        .view()
                        .map(|v| v.ambiguous_candidates.clone())
                        .unwrap_or_default();
                    let view = OrderView::build(order, items, previous.view(), candidates);
                    tracing::info!(order_id = %view.order.id, scope = %self.scope, "Order paid, showing celebration");
                    self.celebration_deadline = Some(Instant::now() + self.celebration);
                    self.set_state(DisplayState::PaymentCelebration(view));
                    return Ok(self.state());
                }
                Some(order) if scope::order_in_scope(&self.scope, &order) => {
                    let items = self.store.get_items_for_order(&order.id).await?;
                    let candidates = self.other_candidates(&order.id).await?;
                    self.set_state(DisplayState::Active(OrderView::build(
                        order,
                        items,
                        previous.view(),
                        candidates,
                    )));
                    return Ok(self.state());
                }
                Some(order) => {
                    tracing::debug!(order_id = %order.id, scope = %self.scope, "Order left display scope");
                }
                None => {
                    tracing::debug!(order_id = %order_id, scope = %self.scope, "Projected order deleted");
                }
            }
        }

        let resolution = scope::resolve(self.store.as_ref(), &self.scope).await?;
        let state = match resolution.order {
            Some(order) => {
                let items = self.store.get_items_for_order(&order.id).await?;
                DisplayState::Active(OrderView::build(
                    order,
                    items,
                    previous.view(),
                    resolution.ambiguous_candidates,
                ))
            }
            None => DisplayState::Idle,
        };
        self.set_state(state);
        Ok(self.state())
    }

    /// React to one sync message; returns whether it was accepted
    pub async fn handle(&mut self, msg: &SyncMessage) -> StoreResult<bool> {
        if self.celebration_deadline.is_some() {
            return Ok(false);
        }

        let current = self.current_order_id();
        if !self.listen.accepts(msg, current.as_deref()) {
            tracing::trace!(order_id = %msg.order_id, scope = %msg.scope_id, "Message outside display scope");
            return Ok(false);
        }

        self.refresh().await?;
        Ok(true)
    }

    /// Expire the celebration once `now` passes its deadline
    pub async fn tick(&mut self, now: Instant) -> StoreResult<bool> {
        match self.celebration_deadline {
            Some(deadline) if now >= deadline => {
                self.celebration_deadline = None;
                self.set_state(DisplayState::Idle);
                self.refresh().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Event loop: sync messages, celebration timer, shutdown
    pub async fn run(&mut self, mut subscription: SyncSubscription, shutdown: CancellationToken) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(scope = %self.scope, error = %e, "Initial display load failed");
        }

        loop {
            let deadline = self.celebration_deadline;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(scope = %self.scope, "Order projector shutting down");
                    break;
                }
                _ = celebration_elapsed(deadline) => {
                    if let Err(e) = self.tick(Instant::now()).await {
                        tracing::warn!(scope = %self.scope, error = %e, "Failed to reload after celebration");
                    }
                }
                recv = subscription.recv() => match recv {
                    Recv::Message(msg) => {
                        if let Err(e) = self.handle(&msg).await {
                            tracing::warn!(order_id = %msg.order_id, error = %e, "Failed to refresh display");
                        }
                    }
                    Recv::Lagged(n) => {
                        tracing::warn!(scope = %self.scope, skipped = n, "Projector lagged, reloading from store");
                        if let Err(e) = self.refresh().await {
                            tracing::warn!(scope = %self.scope, error = %e, "Failed to reload after lag");
                        }
                    }
                    Recv::Closed => {
                        tracing::info!(scope = %self.scope, "Sync channel closed, projector stopping");
                        break;
                    }
                },
            }
        }
    }
}

async fn celebration_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::SyncChannel;
    use crate::orders::money::PricingPolicy;
    use crate::orders::writer::OrderWriter;
    use crate::store::RedbDraftStore;
    use shared::order::ItemInput;

    fn setup() -> (Arc<dyn DraftStore>, SyncChannel) {
        let store: Arc<dyn DraftStore> = Arc::new(RedbDraftStore::open_in_memory().unwrap());
        (store, SyncChannel::new("test", 64))
    }

    fn writer(store: &Arc<dyn DraftStore>, channel: &SyncChannel, cashier: &str) -> OrderWriter {
        OrderWriter::new(store.clone(), channel.clone(), PricingPolicy::default(), cashier)
    }

    #[tokio::test]
    async fn test_starts_loading_then_idle() {
        let (store, _channel) = setup();
        let mut projector = OrderProjector::new(store, DisplayScope::Auto, DEFAULT_CELEBRATION);
        assert_eq!(projector.state(), DisplayState::Loading);
        assert_eq!(projector.refresh().await.unwrap(), DisplayState::Idle);
    }

    #[tokio::test]
    async fn test_projects_from_store_not_payload() {
        let (store, channel) = setup();
        let mut sub = channel.subscribe().unwrap();
        let mut w = writer(&store, &channel, "c1");
        let mut projector = OrderProjector::new(
            store.clone(),
            DisplayScope::Cashier("c1".to_string()),
            DEFAULT_CELEBRATION,
        );
        projector.refresh().await.unwrap();

        let item = w
            .add_item(ItemInput::product("p-a", "Product A", 130.0))
            .await
            .unwrap();
        let mut msg = sub.drain().remove(0);
        msg.payload = serde_json::json!({ "totalAmount": 999 });

        assert!(projector.handle(&msg).await.unwrap());
        let state = projector.state();
        let view = state.view().unwrap();
        assert_eq!(view.totals.total_amount, 130.0);
        assert_eq!(view.items[0].id, item.id);
    }

    #[tokio::test]
    async fn test_newly_added_diff() {
        let (store, channel) = setup();
        let mut sub = channel.subscribe().unwrap();
        let mut w = writer(&store, &channel, "c1");
        let mut projector = OrderProjector::new(store.clone(), DisplayScope::Auto, DEFAULT_CELEBRATION);

        let first = w.add_item(ItemInput::product("a", "A", 1.0)).await.unwrap();
        projector.handle(&sub.drain()[0]).await.unwrap();
        assert!(projector.state().view().unwrap().newly_added.is_empty());

        let second = w.add_item(ItemInput::product("b", "B", 1.0)).await.unwrap();
        projector.handle(&sub.drain()[0]).await.unwrap();
        let state = projector.state();
        assert_eq!(state.view().unwrap().newly_added, vec![second.id]);
        assert_ne!(first.id, state.view().unwrap().newly_added[0]);
    }

    #[tokio::test]
    async fn test_auto_mode_exposes_ambiguity() {
        let (store, channel) = setup();
        let mut sub = channel.subscribe().unwrap();
        let mut alice = writer(&store, &channel, "alice");
        let mut bob = writer(&store, &channel, "bob");
        let mut projector = OrderProjector::new(store.clone(), DisplayScope::Auto, DEFAULT_CELEBRATION);

        let a = alice.add_item(ItemInput::product("a", "A", 1.0)).await.unwrap();
        projector.handle(&sub.drain()[0]).await.unwrap();
        assert!(!projector.state().view().unwrap().is_ambiguous());

        bob.add_item(ItemInput::product("b", "B", 2.0)).await.unwrap();
        alice.increment(&a.id).await.unwrap();
        for msg in sub.drain() {
            projector.handle(&msg).await.unwrap();
        }
        let state = projector.state();
        let view = state.view().unwrap();
        assert!(view.is_ambiguous());
        assert_eq!(view.ambiguous_candidates.len(), 1);
        assert!(!view.ambiguous_candidates.contains(&view.order.id));

        // a scoped display never reports ambiguity
        let mut scoped = OrderProjector::new(
            store.clone(),
            DisplayScope::Cashier("alice".to_string()),
            DEFAULT_CELEBRATION,
        );
        let state = scoped.refresh().await.unwrap();
        assert!(!state.view().unwrap().is_ambiguous());
    }

    #[tokio::test]
    async fn test_ignores_other_scopes() {
        let (store, channel) = setup();
        let mut sub = channel.subscribe().unwrap();
        let mut other = writer(&store, &channel, "c2");
        let mut projector = OrderProjector::new(
            store.clone(),
            DisplayScope::Table("5".to_string()),
            DEFAULT_CELEBRATION,
        );
        projector.refresh().await.unwrap();

        other.add_item(ItemInput::product("a", "A", 1.0)).await.unwrap();
        let msg = sub.drain().remove(0);
        assert!(!projector.handle(&msg).await.unwrap());
        assert_eq!(projector.state(), DisplayState::Idle);
    }

    #[tokio::test]
    async fn test_follows_order_moved_to_table() {
        let (store, channel) = setup();
        let mut sub = channel.subscribe().unwrap();
        let mut w = writer(&store, &channel, "c1");
        let mut cashier_view = OrderProjector::new(
            store.clone(),
            DisplayScope::Cashier("c1".to_string()),
            DEFAULT_CELEBRATION,
        );

        w.add_item(ItemInput::product("a", "A", 1.0)).await.unwrap();
        cashier_view.handle(&sub.drain()[0]).await.unwrap();

        w.set_table(Some("9".to_string())).await.unwrap();
        let msg = sub.drain().remove(0);
        assert!(cashier_view.handle(&msg).await.unwrap());
        let state = cashier_view.state();
        assert_eq!(
            state.view().unwrap().order.table_number.as_deref(),
            Some("9")
        );
    }

    #[tokio::test]
    async fn test_deleted_order_goes_idle() {
        let (store, channel) = setup();
        let mut sub = channel.subscribe().unwrap();
        let mut w = writer(&store, &channel, "c1");
        let mut projector = OrderProjector::new(store.clone(), DisplayScope::Auto, DEFAULT_CELEBRATION);

        w.add_item(ItemInput::product("a", "A", 1.0)).await.unwrap();
        projector.handle(&sub.drain()[0]).await.unwrap();
        w.clear().await.unwrap();

        for msg in sub.drain() {
            projector.handle(&msg).await.unwrap();
        }
        assert_eq!(projector.state(), DisplayState::Idle);
    }

    #[tokio::test]
    async fn test_paid_order_celebrates_then_idles() {
        let (store, channel) = setup();
        let mut w = writer(&store, &channel, "c1");
        let mut projector = OrderProjector::new(
            store.clone(),
            DisplayScope::Cashier("c1".to_string()),
            Duration::from_millis(50),
        );

        let item = w.add_item(ItemInput::product("a", "A", 10.0)).await.unwrap();
        projector.refresh().await.unwrap();

        let mut order = store.get_order(&item.order_id).await.unwrap().unwrap();
        order.status = OrderStatus::Paid;
        store.put_order(&order).await.unwrap();

        let state = projector.refresh().await.unwrap();
        assert!(state.is_celebrating());
        assert_eq!(state.view().unwrap().totals.total_amount, 10.0);

        // still celebrating before the deadline
        assert!(!projector.tick(Instant::now()).await.unwrap());

        assert!(
            projector
                .tick(Instant::now() + Duration::from_millis(100))
                .await
                .unwrap()
        );
        assert_eq!(projector.state(), DisplayState::Idle);
    }

    #[tokio::test]
    async fn test_watch_receives_updates() {
        let (store, channel) = setup();
        let mut w = writer(&store, &channel, "c1");
        let mut projector = OrderProjector::new(store.clone(), DisplayScope::Auto, DEFAULT_CELEBRATION);
        let mut rx = projector.watch();

        w.add_item(ItemInput::product("a", "A", 4.0)).await.unwrap();
        projector.refresh().await.unwrap();

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.view().unwrap().totals.total_amount, 4.0);
    }

    #[tokio::test]
    async fn test_run_loop_projects_and_stops() {
        let (store, channel) = setup();
        let mut w = writer(&store, &channel, "c1");
        let mut projector = OrderProjector::new(store.clone(), DisplayScope::Auto, DEFAULT_CELEBRATION);
        let mut rx = projector.watch();
        let sub = channel.subscribe().unwrap();
        let shutdown = CancellationToken::new();

        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            projector.run(sub, token).await;
            projector
        });

        w.add_item(ItemInput::product("a", "A", 7.5)).await.unwrap();

        let state = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.unwrap();
                let state = rx.borrow_and_update().clone();
                if state.view().is_some() {
                    return state;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(state.view().unwrap().totals.total_amount, 7.5);

        shutdown.cancel();
        let projector = handle.await.unwrap();
        assert!(projector.state().view().is_some());
    }
}
