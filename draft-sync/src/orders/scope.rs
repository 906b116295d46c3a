//! Display scope resolution
//!
//! Maps a display surface's `DisplayScope` to the order it should project
//! and to the set of sync messages it listens to.

use shared::message::SyncMessage;
use shared::order::{DisplayScope, DraftOrder, ScopeId};

use crate::store::{DraftStore, StoreResult};

/// Which sync messages a reader reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenScope {
    Table(ScopeId),
    /// `takeout_{cashier}` plus the bare cashier id
    Cashier { takeout: ScopeId, cashier: ScopeId },
    All,
}

impl ListenScope {
    pub fn for_display(scope: &DisplayScope) -> Self {
        match scope {
            DisplayScope::Table(table) => ListenScope::Table(ScopeId::table(table.as_str())),
            DisplayScope::Cashier(cashier) => ListenScope::Cashier {
                takeout: ScopeId::takeout(cashier),
                cashier: ScopeId::cashier(cashier.as_str()),
            },
            DisplayScope::Auto => ListenScope::All,
        }
    }

    /// Messages for the currently projected order are always accepted, so a
    /// takeout order that later gets a table keeps its display.
    pub fn accepts(&self, msg: &SyncMessage, current_order_id: Option<&str>) -> bool {
        if current_order_id == Some(msg.order_id.as_str()) {
            return true;
        }
        match self {
            ListenScope::Table(scope) => msg.matches_scope(scope),
            ListenScope::Cashier { takeout, cashier } => {
                msg.matches_scope(takeout) || msg.matches_scope(cashier)
            }
            ListenScope::All => true,
        }
    }
}

/// Whether `order` still belongs to the display scope
pub fn order_in_scope(scope: &DisplayScope, order: &DraftOrder) -> bool {
    match scope {
        DisplayScope::Table(table) => order.table_number.as_deref() == Some(table.as_str()),
        DisplayScope::Cashier(cashier) => &order.cashier_id == cashier,
        DisplayScope::Auto => true,
    }
}

/// Outcome of resolving a display scope against the store
#[derive(Debug, Clone)]
pub struct ScopeResolution {
    /// Active order to project, if any
    pub order: Option<DraftOrder>,
    pub listen: ListenScope,
    /// Auto mode with several active orders: ids of the ones not chosen
    pub ambiguous_candidates: Vec<String>,
}

impl ScopeResolution {
    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous_candidates.is_empty()
    }
}

/// Resolve which active order a display projects
///
/// table → the table's active order; cashier → the cashier's most recent
/// active order; auto → the most recently created active order overall.
pub async fn resolve(store: &dyn DraftStore, scope: &DisplayScope) -> StoreResult<ScopeResolution> {
    let listen = ListenScope::for_display(scope);

    let (order, ambiguous_candidates) = match scope {
        DisplayScope::Table(table) => (store.get_order_by_table(table).await?, Vec::new()),
        DisplayScope::Cashier(cashier) => (
            store
                .get_active_orders_for_cashier(cashier)
                .await?
                .into_iter()
                .next(),
            Vec::new(),
        ),
        DisplayScope::Auto => {
            let mut active = store.get_all_active_orders().await?.into_iter();
            let chosen = active.next();
            let others: Vec<String> = active.map(|o| o.id).collect();
            if let Some(order) = &chosen
                && !others.is_empty()
            {
                tracing::warn!(
                    chosen = %order.id,
                    others = others.len(),
                    "Multiple active orders, auto-detect picked the newest; pass table= or cashier= to disambiguate"
                );
            }
            (chosen, others)
        }
    };

    tracing::debug!(
        scope = %scope,
        order_id = order.as_ref().map(|o| o.id.as_str()).unwrap_or("-"),
        "Display scope resolved"
    );

    Ok(ScopeResolution {
        order,
        listen,
        ambiguous_candidates,
    })
}
