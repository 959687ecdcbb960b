//! Data shared by every page: store name, cart badge and flash message.

use tower_sessions::Session;

use emporium_core::{CurrencyCode, format_money};
use rust_decimal::Decimal;

use crate::models::Cart;
use crate::models::session::keys;
use crate::state::AppState;

/// Header and footer data for the base template.
#[derive(Debug, Clone)]
pub struct Layout {
    pub store_name: String,
    pub cart_count: i32,
    pub flash: Option<String>,
    currency: CurrencyCode,
}

impl Layout {
    /// Build the layout, taking any pending flash message.
    pub async fn load(state: &AppState, session: &Session) -> Self {
        let cart = load_cart(session).await;
        let flash = take_flash(session).await;
        Self {
            store_name: state.config().store_name.clone(),
            cart_count: cart.item_count(),
            flash,
            currency: state.config().currency,
        }
    }

    /// Format an amount in the store currency.
    #[must_use]
    pub fn money(&self, amount: Decimal) -> String {
        format_money(amount, self.currency)
    }
}

/// Read the cart from the session. A missing or unreadable cart is empty.
pub async fn load_cart(session: &Session) -> Cart {
    match session.get::<Cart>(keys::CART).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read cart from session");
            Cart::default()
        }
    }
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns the session error if the store cannot be written.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CART, cart).await
}

/// Queue a message for the next page.
///
/// # Errors
///
/// Returns the session error if the store cannot be written.
pub async fn set_flash(session: &Session, message: &str) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::FLASH, message).await
}

/// Remove and return the flash message. Sessions without one stay unmodified.
async fn take_flash(session: &Session) -> Option<String> {
    let message = session.get::<String>(keys::FLASH).await.ok().flatten()?;
    if let Err(e) = session.remove::<String>(keys::FLASH).await {
        tracing::warn!(error = %e, "Failed to clear flash message");
    }
    Some(message)
}
