//! Draft order and draft line item records
//!
//! These are the full records written to the local store. Writes always
//! replace the whole record; there are no partial-field patches.

use super::scope::ScopeId;
use super::types::{CustomerRef, ItemRef, OrderStatus, OrderTotals};
use crate::util::{new_id, now_millis};
use serde::{Deserialize, Serialize};

/// Locally-staged order, not yet finalized to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftOrder {
    /// Locally generated id, stable for the lifetime of the draft
    pub id: String,
    /// Owning cashier
    pub cashier_id: String,
    /// Table; `None` means takeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerRef>,
    pub subtotal: f64,
    #[serde(default)]
    pub discount_amount: f64,
    #[serde(default)]
    pub tax_amount: f64,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
    /// Set when the order transitions to `Paid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
}

impl DraftOrder {
    /// Create an empty draft for a cashier
    pub fn new(cashier_id: impl Into<String>, table_number: Option<String>) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            cashier_id: cashier_id.into(),
            table_number,
            customer: None,
            subtotal: 0.0,
            discount_amount: 0.0,
            tax_amount: 0.0,
            total_amount: 0.0,
            status: OrderStatus::Draft,
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }

    /// Broadcast routing key: table if present, else `takeout_{cashier}`
    pub fn scope_id(&self) -> ScopeId {
        ScopeId::for_order(self.table_number.as_deref(), &self.cashier_id)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_takeout(&self) -> bool {
        self.table_number.is_none()
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            tax_amount: self.tax_amount,
            total_amount: self.total_amount,
        }
    }

    pub fn apply_totals(&mut self, totals: OrderTotals) {
        self.subtotal = totals.subtotal;
        self.discount_amount = totals.discount_amount;
        self.tax_amount = totals.tax_amount;
        self.total_amount = totals.total_amount;
    }

    /// Bump `updated_at`, never moving it backwards
    pub fn touch(&mut self, now: i64) {
        self.updated_at = self.updated_at.max(now);
    }
}

/// Line item of a draft order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftOrderItem {
    pub id: String,
    pub order_id: String,
    pub item_ref: ItemRef,
    /// Display name snapshot
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    /// Discount applied to the whole line
    #[serde(default)]
    pub line_discount: f64,
    /// quantity × unit_price − line_discount
    pub subtotal: f64,
    #[serde(default)]
    pub is_vip_price: bool,
    #[serde(default)]
    pub is_complimentary: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DraftOrderItem {
    /// New line with zero amounts; callers price it before persisting
    pub fn new(
        order_id: impl Into<String>,
        item_ref: ItemRef,
        name: impl Into<String>,
        unit_price: f64,
        quantity: u32,
    ) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            order_id: order_id.into(),
            item_ref,
            name: name.into(),
            quantity,
            unit_price,
            line_discount: 0.0,
            subtotal: 0.0,
            is_vip_price: false,
            is_complimentary: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: i64) {
        self.updated_at = self.updated_at.max(now);
    }
}
