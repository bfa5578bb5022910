use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::errors::CartError;
use super::value_objects::{CartItem, CartLineKey, CartSnapshot, MAX_LINE_QUANTITY};

// ============================================================================
// Cart Aggregate - one per customer
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub owner: Uuid,
    pub items: Vec<CartItem>,
    /// Bumped on every mutation
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            items: Vec::new(),
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(|i| i.line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds a line, or increments the quantity of the line with the same key.
    pub fn add_item(&mut self, item: CartItem) {
        let key = item.key();
        match self.items.iter_mut().find(|existing| existing.matches(&key)) {
            Some(existing) => {
                let quantity = existing.quantity.saturating_add(item.quantity).min(MAX_LINE_QUANTITY);
                existing.unit_price = item.unit_price;
                existing.name = item.name;
                existing.set_quantity(quantity);
            }
            None => self.items.push(item),
        }
        self.touch();
    }

    pub fn update_quantity(&mut self, key: &CartLineKey, quantity: u32) -> Result<(), CartError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.matches(key))
            .ok_or(CartError::LineNotFound(key.product_id))?;
        item.set_quantity(quantity);
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, key: &CartLineKey) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| !i.matches(key));
        if self.items.len() == before {
            return Err(CartError::LineNotFound(key.product_id));
        }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            owner: self.owner,
            revision: self.revision,
            items: self.items.clone(),
        }
    }

    /// Removes exactly the quantities a checkout consumed. Lines added or
    /// increased after the snapshot keep the difference.
    pub fn remove_snapshot(&mut self, snapshot: &CartSnapshot) {
        for taken in &snapshot.items {
            let key = taken.key();
            if let Some(pos) = self.items.iter().position(|i| i.matches(&key)) {
                let remaining = self.items[pos].quantity.saturating_sub(taken.quantity);
                if remaining == 0 {
                    self.items.remove(pos);
                } else {
                    self.items[pos].set_quantity(remaining);
                }
            }
        }
        self.touch();
    }

    /// Puts back the lines of a snapshot whose checkout did not go through.
    pub fn restore(&mut self, snapshot: &CartSnapshot) {
        for item in &snapshot.items {
            self.add_item(item.clone());
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::AttributeSelection;

    fn key(product: u128, selection: &[(u128, u128)]) -> CartLineKey {
        CartLineKey {
            product_id: Uuid::from_u128(product),
            variant_id: None,
            attribute_selection: selection
                .iter()
                .map(|(g, v)| (Uuid::from_u128(*g), Uuid::from_u128(*v)))
                .collect::<AttributeSelection>(),
        }
    }

    fn item(key: CartLineKey, quantity: u32) -> CartItem {
        CartItem::new(key, "Phone", quantity, Decimal::from(1_000_000))
    }

    #[test]
    fn test_same_tuple_increments_quantity() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(item(key(1, &[(10, 11)]), 1));
        cart.add_item(item(key(1, &[(10, 11)]), 2));

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.subtotal(), Decimal::from(3_000_000));
    }

    #[test]
    fn test_different_selection_is_a_separate_line() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(item(key(1, &[(10, 11)]), 1));
        cart.add_item(item(key(1, &[(10, 12)]), 1));
        cart.add_item(item(key(1, &[]), 1));

        assert_eq!(cart.items.len(), 3);
    }

    #[test]
    fn test_merged_quantity_is_clamped() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(item(key(1, &[]), 900));
        cart.add_item(item(key(1, &[]), 900));

        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_update_and_remove_unknown_line() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(item(key(1, &[]), 1));

        cart.update_quantity(&key(1, &[]), 4).unwrap();
        assert_eq!(cart.items[0].quantity, 4);

        assert!(matches!(cart.update_quantity(&key(2, &[]), 1), Err(CartError::LineNotFound(_))));
        assert!(matches!(cart.remove_item(&key(2, &[])), Err(CartError::LineNotFound(_))));

        cart.remove_item(&key(1, &[])).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_snapshot_keeps_later_additions() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(item(key(1, &[]), 2));
        cart.add_item(item(key(2, &[]), 1));

        let snapshot = cart.snapshot();

        // Concurrent mutation between snapshot and cleanup
        cart.add_item(item(key(1, &[]), 1));
        cart.add_item(item(key(3, &[]), 1));

        cart.remove_snapshot(&snapshot);

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].product_id, Uuid::from_u128(1));
        assert_eq!(cart.items[0].quantity, 1);
        assert_eq!(cart.items[1].product_id, Uuid::from_u128(3));
    }

    #[test]
    fn test_every_mutation_bumps_revision() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(item(key(1, &[]), 1));
        cart.update_quantity(&key(1, &[]), 2).unwrap();
        cart.clear();

        assert_eq!(cart.revision, 3);
        assert_eq!(cart.snapshot().revision, 3);
    }
}
