//! Session keys.
//!
//! The cart and checkout progress live in the session; nothing is written to
//! the database until the order is placed.

/// Session keys for storefront state.
pub mod keys {
    /// Key for the shopping cart.
    pub const CART: &str = "cart";

    /// Key for checkout progress.
    pub const CHECKOUT: &str = "checkout";

    /// Key for the one-shot flash message shown on the next page.
    pub const FLASH: &str = "flash";
}
