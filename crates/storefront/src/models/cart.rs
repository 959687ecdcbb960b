//! Session shopping cart.

use serde::{Deserialize, Serialize};

use emporium_core::ProductId;
use emporium_core::pricing::MAX_LINE_QUANTITY;

/// One product in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// The cart kept in the customer's session.
///
/// Quantities are always within `1..=MAX_LINE_QUANTITY`; a product appears
/// at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> i32 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map_or(0, |l| l.quantity)
    }

    /// Add units of a product. Non-positive quantities count as one.
    pub fn add(&mut self, product_id: ProductId, quantity: i32) {
        let quantity = quantity.max(1);
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY),
            None => self.lines.push(CartLine {
                product_id,
                quantity: quantity.min(MAX_LINE_QUANTITY),
            }),
        }
    }

    /// Set the quantity of a product. Zero or less removes it.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i32) {
        if quantity <= 0 {
            self.remove(product_id);
            return;
        }
        let quantity = quantity.min(MAX_LINE_QUANTITY);
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity = quantity,
            None => self.lines.push(CartLine {
                product_id,
                quantity,
            }),
        }
    }

    pub fn remove(&mut self, product_id: ProductId) {
        self.lines.retain(|l| l.product_id != product_id);
    }

    /// Drop lines whose product is no longer sold.
    pub fn retain_products(&mut self, keep: impl Fn(ProductId) -> bool) {
        self.lines.retain(|l| keep(l.product_id));
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const A: ProductId = ProductId::new(1);
    const B: ProductId = ProductId::new(2);

    #[test]
    fn test_add_merges_lines() {
        let mut cart = Cart::default();
        cart.add(A, 2);
        cart.add(B, 1);
        cart.add(A, 3);
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.quantity_of(A), 5);
        assert_eq!(cart.item_count(), 6);
    }

    #[test]
    fn test_add_clamps_quantity() {
        let mut cart = Cart::default();
        cart.add(A, 0);
        assert_eq!(cart.quantity_of(A), 1);
        cart.add(A, 500);
        assert_eq!(cart.quantity_of(A), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::default();
        cart.add(A, 2);
        cart.set_quantity(A, 0);
        assert!(cart.is_empty());

        cart.set_quantity(B, 250);
        assert_eq!(cart.quantity_of(B), MAX_LINE_QUANTITY);
        cart.set_quantity(B, -4);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_retain_products() {
        let mut cart = Cart::default();
        cart.add(A, 1);
        cart.add(B, 1);
        cart.retain_products(|id| id == B);
        assert_eq!(cart.lines(), &[CartLine { product_id: B, quantity: 1 }]);
    }

    #[test]
    fn test_session_round_trip_shape() {
        let mut cart = Cart::default();
        cart.add(A, 2);
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json, serde_json::json!({"lines": [{"product_id": 1, "quantity": 2}]}));
    }
}
