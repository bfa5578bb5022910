use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::AttributeSelection;

// ============================================================================
// Cart Value Objects
// ============================================================================

pub const MAX_LINE_QUANTITY: u32 = 999;

/// Clamp a requested quantity into `[1, MAX_LINE_QUANTITY]`.
pub fn clamp_quantity(requested: i64) -> u32 {
    requested.clamp(1, i64::from(MAX_LINE_QUANTITY)) as u32
}

/// Identity of a cart line: the same product, variant and attribute choices
/// always land on the same line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineKey {
    pub product_id: Uuid,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    #[serde(default)]
    pub attribute_selection: AttributeSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub attribute_selection: AttributeSelection,
    pub line_total: Decimal,
}

impl CartItem {
    pub fn new(key: CartLineKey, name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        let quantity = quantity.clamp(1, MAX_LINE_QUANTITY);
        Self {
            product_id: key.product_id,
            variant_id: key.variant_id,
            name: name.into(),
            quantity,
            unit_price,
            attribute_selection: key.attribute_selection,
            line_total: unit_price * Decimal::from(quantity),
        }
    }

    pub fn key(&self) -> CartLineKey {
        CartLineKey {
            product_id: self.product_id,
            variant_id: self.variant_id,
            attribute_selection: self.attribute_selection.clone(),
        }
    }

    pub fn matches(&self, key: &CartLineKey) -> bool {
        self.product_id == key.product_id
            && self.variant_id == key.variant_id
            && self.attribute_selection == key.attribute_selection
    }

    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity.clamp(1, MAX_LINE_QUANTITY);
        self.line_total = self.unit_price * Decimal::from(self.quantity);
    }
}

/// Consistent copy of a cart, the only input order creation accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    pub owner: Uuid,
    pub revision: u64,
    pub items: Vec<CartItem>,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
