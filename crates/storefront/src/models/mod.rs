//! Session-held storefront models.

pub mod cart;
pub mod checkout;
pub mod session;

pub use cart::{Cart, CartLine};
pub use checkout::{CheckoutState, CheckoutStep, ContactDetails, ShippingDetails};
