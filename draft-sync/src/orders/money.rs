//! Money calculation utilities using rust_decimal for precision
//!
//! All calculations are done using `Decimal` internally, then converted to
//! `f64` for storage. Order totals are always recomputed from the complete
//! item set, never patched incrementally.

use rust_decimal::prelude::*;
use shared::order::{DraftOrderItem, ItemInput, OrderTotals};

use super::error::SyncError;

/// Rounding strategy for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed unit price per item
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line
pub const MAX_QUANTITY: u32 = 9999;

/// Pricing inputs that are not carried by the items themselves
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PricingPolicy {
    /// Tax applied on (subtotal − discount), in percent
    pub tax_rate_percent: f64,
}

impl PricingPolicy {
    pub fn with_tax_rate(tax_rate_percent: f64) -> Self {
        Self { tax_rate_percent }
    }
}

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), SyncError> {
    if !value.is_finite() {
        return Err(SyncError::InvalidOperation(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

/// Validate an ItemInput before it touches the store
pub fn validate_item_input(input: &ItemInput) -> Result<(), SyncError> {
    if input.name.trim().is_empty() {
        return Err(SyncError::InvalidOperation(
            "item name must not be empty".to_string(),
        ));
    }

    require_finite(input.unit_price, "unit_price")?;
    if input.unit_price < 0.0 {
        return Err(SyncError::InvalidOperation(format!(
            "unit_price must be non-negative, got {}",
            input.unit_price
        )));
    }
    if input.unit_price > MAX_PRICE {
        return Err(SyncError::InvalidOperation(format!(
            "unit_price exceeds maximum allowed ({}), got {}",
            MAX_PRICE, input.unit_price
        )));
    }

    require_finite(input.line_discount, "line_discount")?;
    if input.line_discount < 0.0 {
        return Err(SyncError::InvalidOperation(format!(
            "line_discount must be non-negative, got {}",
            input.line_discount
        )));
    }

    validate_quantity(input.quantity)
}

pub fn validate_quantity(quantity: u32) -> Result<(), SyncError> {
    if quantity == 0 {
        return Err(SyncError::InvalidOperation(
            "quantity must be positive".to_string(),
        ));
    }
    if quantity > MAX_QUANTITY {
        return Err(SyncError::InvalidOperation(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, quantity
        )));
    }
    Ok(())
}

fn line_gross(item: &DraftOrderItem) -> Decimal {
    to_decimal(item.unit_price) * Decimal::from(item.quantity)
}

/// Discount actually applied to a line, clamped to [0, gross]
///
/// Complimentary lines are discounted in full.
fn effective_line_discount(item: &DraftOrderItem) -> Decimal {
    let gross = line_gross(item);
    if item.is_complimentary {
        return gross;
    }
    to_decimal(item.line_discount).max(Decimal::ZERO).min(gross)
}

/// Recompute `line_discount` and `subtotal` of a line from quantity and price
pub fn price_line(item: &mut DraftOrderItem) {
    let gross = line_gross(item);
    let discount = effective_line_discount(item);
    item.line_discount = to_f64(discount);
    item.subtotal = to_f64(gross - discount);
}

/// Recompute order totals from the full item set
///
/// Pure function of `items` and `policy`: calling it twice on the same input
/// yields identical totals.
pub fn recalculate_totals(items: &[DraftOrderItem], policy: &PricingPolicy) -> OrderTotals {
    let mut subtotal = Decimal::ZERO;
    let mut discount = Decimal::ZERO;

    for item in items {
        subtotal += line_gross(item);
        discount += effective_line_discount(item);
    }

    let taxable = (subtotal - discount).max(Decimal::ZERO);
    let tax = (taxable * to_decimal(policy.tax_rate_percent) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    let total = subtotal - discount + tax;

    OrderTotals {
        subtotal: to_f64(subtotal),
        discount_amount: to_f64(discount),
        tax_amount: to_f64(tax),
        total_amount: to_f64(total),
    }
}
