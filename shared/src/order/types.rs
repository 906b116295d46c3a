//! Shared types for draft orders

use serde::{Deserialize, Serialize};

// ============================================================================
// Status
// ============================================================================

/// Draft order lifecycle status
///
/// `Draft` → `Confirmed` → `Paid`. `Paid` is terminal: the record is only
/// kept around for a short grace window before deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Draft,
    Confirmed,
    Paid,
}

impl OrderStatus {
    /// `Draft` and `Confirmed` orders are active; `Paid` is not.
    pub fn is_active(&self) -> bool {
        !matches!(self, OrderStatus::Paid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// References
// ============================================================================

/// What a line item sells: exactly one of product or package
///
/// Package lines are a single item at package price. Splitting a package into
/// kitchen-routable products happens on the backend at finalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemRef {
    Product { product_id: String },
    Package { package_id: String },
}

impl ItemRef {
    pub fn product(id: impl Into<String>) -> Self {
        ItemRef::Product {
            product_id: id.into(),
        }
    }

    pub fn package(id: impl Into<String>) -> Self {
        ItemRef::Package {
            package_id: id.into(),
        }
    }

    pub fn product_id(&self) -> Option<&str> {
        match self {
            ItemRef::Product { product_id } => Some(product_id),
            ItemRef::Package { .. } => None,
        }
    }

    pub fn package_id(&self) -> Option<&str> {
        match self {
            ItemRef::Package { package_id } => Some(package_id),
            ItemRef::Product { .. } => None,
        }
    }

    pub fn is_package(&self) -> bool {
        matches!(self, ItemRef::Package { .. })
    }
}

/// Customer attached to an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CustomerRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

// ============================================================================
// Cart Input
// ============================================================================

/// Item as entered at the register, before it becomes a line item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemInput {
    pub item_ref: ItemRef,
    pub name: String,
    /// Unit price to charge (VIP price already applied when `is_vip_price`)
    pub unit_price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub line_discount: f64,
    #[serde(default)]
    pub is_vip_price: bool,
    #[serde(default)]
    pub is_complimentary: bool,
}

impl ItemInput {
    pub fn product(id: impl Into<String>, name: impl Into<String>, unit_price: f64) -> Self {
        Self {
            item_ref: ItemRef::product(id),
            name: name.into(),
            unit_price,
            quantity: 1,
            line_discount: 0.0,
            is_vip_price: false,
            is_complimentary: false,
        }
    }

    pub fn package(id: impl Into<String>, name: impl Into<String>, unit_price: f64) -> Self {
        Self {
            item_ref: ItemRef::package(id),
            ..Self::product("", name, unit_price)
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn vip(mut self) -> Self {
        self.is_vip_price = true;
        self
    }

    pub fn complimentary(mut self) -> Self {
        self.is_complimentary = true;
        self
    }
}

// ============================================================================
// Totals
// ============================================================================

/// Derived order totals
///
/// `total_amount = subtotal - discount_amount + tax_amount`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_activity() {
        assert!(OrderStatus::Draft.is_active());
        assert!(OrderStatus::Confirmed.is_active());
        assert!(!OrderStatus::Paid.is_active());
    }

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Confirmed).unwrap(),
            "\"confirmed\""
        );
    }

    #[test]
    fn test_item_ref_is_one_or_other() {
        let product = ItemRef::product("p-1");
        assert_eq!(product.product_id(), Some("p-1"));
        assert_eq!(product.package_id(), None);

        let package = ItemRef::package("pkg-1");
        assert!(package.is_package());
        assert_eq!(package.product_id(), None);

        let json = serde_json::to_value(&package).unwrap();
        assert_eq!(json["kind"], "package");
        assert_eq!(json["package_id"], "pkg-1");
        assert!(json.get("product_id").is_none());
    }
}
