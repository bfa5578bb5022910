use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Pricing Value Objects
// ============================================================================

/// Chosen attribute value per attribute group (group id → value id).
///
/// Ordered so two selections with the same choices compare and serialize
/// identically, which cart line identity relies on.
pub type AttributeSelection = BTreeMap<Uuid, Uuid>;

/// Round a money amount to two decimal places, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    pub id: Uuid,
    pub label: String,
    #[serde(default)]
    pub price_adjustment: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeGroup {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    pub values: Vec<AttributeValue>,
}

impl AttributeGroup {
    pub fn value(&self, value_id: Uuid) -> Option<&AttributeValue> {
        self.values.iter().find(|v| v.id == value_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    Percent,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    pub value: Decimal,
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
    #[serde(default)]
    pub max_discount: Option<Decimal>,
}

/// At most one coupon applies to an order; selecting another replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouponSelection {
    coupon: Option<Coupon>,
}

impl CouponSelection {
    pub fn none() -> Self {
        Self::default()
    }

    /// Select `coupon`, returning the one it deselected.
    pub fn select(&mut self, coupon: Coupon) -> Option<Coupon> {
        self.coupon.replace(coupon)
    }

    pub fn current(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponOutcome {
    pub eligible: bool,
    pub discount: Decimal,
}

impl CouponOutcome {
    pub fn ineligible() -> Self {
        Self {
            eligible: false,
            discount: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrice {
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    /// `subtotal + tax + shipping - discount`, the only way totals are built.
    pub fn new(subtotal: Decimal, tax_amount: Decimal, shipping_amount: Decimal, discount_amount: Decimal) -> Self {
        Self {
            subtotal,
            tax_amount,
            shipping_amount,
            discount_amount,
            total_amount: subtotal + tax_amount + shipping_amount - discount_amount,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total_amount == self.subtotal + self.tax_amount + self.shipping_amount - self.discount_amount
            && self.total_amount >= Decimal::ZERO
    }
}

/// Store-wide tax and shipping rules.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingPolicy {
    pub tax_rate_percent: Decimal,
    pub shipping_flat_fee: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_percent: Decimal::ZERO,
            shipping_flat_fee: Decimal::ZERO,
            free_shipping_threshold: None,
        }
    }
}
