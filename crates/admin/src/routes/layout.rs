//! Data shared by every back-office page: the signed-in user, navigation
//! and the flash message.

use rust_decimal::Decimal;
use tower_sessions::Session;

use emporium_core::{CurrencyCode, format_money};

use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Sidebar link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    /// Resource path segment; empty for the dashboard.
    pub key: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
}

impl NavItem {
    /// Link target.
    #[must_use]
    pub fn href(&self) -> String {
        if self.key.is_empty() {
            "/admin".to_string()
        } else {
            format!("/admin/{}", self.key)
        }
    }
}

const fn nav(key: &'static str, label: &'static str, icon: &'static str) -> NavItem {
    NavItem { key, label, icon }
}

/// Sidebar sections in display order.
pub const NAVIGATION: &[NavItem] = &[
    nav("", "Dashboard", "ph-house"),
    nav("orders", "Orders", "ph-receipt"),
    nav("products", "Products", "ph-package"),
    nav("inventory", "Inventory", "ph-warehouse"),
    nav("categories", "Categories", "ph-tree-structure"),
    nav("brands", "Brands", "ph-tag"),
    nav("attributes", "Attributes", "ph-list-bullets"),
    nav("deals", "Deals", "ph-lightning"),
    nav("coupons", "Coupons", "ph-ticket"),
    nav("content-blocks", "Content", "ph-layout"),
    nav("shipping-methods", "Shipping", "ph-truck"),
    nav("quotes", "Quotes", "ph-chat-text"),
    nav("returns", "Returns", "ph-arrow-u-up-left"),
    nav("warranties", "Warranties", "ph-shield-check"),
    nav("users", "Users", "ph-users"),
];

/// Header, sidebar and flash data for the base template.
#[derive(Debug, Clone)]
pub struct Layout {
    pub admin_name: String,
    pub admin_email: String,
    pub role_label: &'static str,
    pub can_write: bool,
    /// Key of the highlighted sidebar item.
    pub active: &'static str,
    pub nav: &'static [NavItem],
    pub flash: Option<String>,
    currency: CurrencyCode,
}

impl Layout {
    /// Build the layout, taking any pending flash message.
    pub async fn load(
        state: &AppState,
        session: &Session,
        admin: &CurrentAdmin,
        active: &'static str,
    ) -> Self {
        Self {
            admin_name: admin.name.clone(),
            admin_email: admin.email.to_string(),
            role_label: admin.role.label(),
            can_write: admin.can_write(),
            active,
            nav: NAVIGATION,
            flash: take_flash(session).await,
            currency: state.config().currency,
        }
    }

    /// Format an amount in the store currency.
    #[must_use]
    pub fn money(&self, amount: &Decimal) -> String {
        format_money(*amount, self.currency)
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Whether `item` is the current section.
    #[must_use]
    pub fn is_active(&self, item: &NavItem) -> bool {
        item.key == self.active
    }
}

/// Queue a message for the next page.
///
/// # Errors
///
/// Returns the session error if the store cannot be written.
pub async fn set_flash(session: &Session, message: &str) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::FLASH, message).await
}

/// Remove and return the flash message. Sessions without one stay unmodified.
async fn take_flash(session: &Session) -> Option<String> {
    let message = session.get::<String>(session_keys::FLASH).await.ok().flatten()?;
    if let Err(e) = session.remove::<String>(session_keys::FLASH).await {
        tracing::warn!(error = %e, "Failed to clear flash message");
    }
    Some(message)
}
