//! Status and kind enums stored as PostgreSQL enums in the `shop` schema.
//!
//! Every enum serializes as `snake_case`, parses from the same form (forms and
//! query strings send it that way) and carries a human `label()` for
//! templates.

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! define_status {
    (
        $(#[$meta:meta])*
        $name:ident, $pg:literal, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => ($wire:literal, $label:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "postgres", derive(sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(type_name = $pg, rename_all = "snake_case"))]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The `snake_case` form used in the database and on the wire.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            /// Human-readable label.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

define_status! {
    /// Fulfillment lifecycle of an order.
    #[derive(Default)]
    OrderStatus, "shop.order_status", "order status" {
        #[default]
        Pending => ("pending", "Pending"),
        Processing => ("processing", "Processing"),
        Shipped => ("shipped", "Shipped"),
        Delivered => ("delivered", "Delivered"),
        Cancelled => ("cancelled", "Cancelled"),
        Refunded => ("refunded", "Refunded"),
    }
}

impl OrderStatus {
    /// Whether an order may move from `self` to `next`.
    ///
    /// Orders move forward only. Cancellation is possible until the parcel
    /// ships; refunds are possible once it has shipped.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered | Self::Refunded)
                | (Self::Delivered, Self::Refunded)
        )
    }

    /// Whether the order has reached a state it can never leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Whether a return may be opened against an order in this state.
    #[must_use]
    pub const fn is_returnable(self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered)
    }
}

define_status! {
    /// Payment state of an order. Orders are created `pending`.
    #[derive(Default)]
    PaymentStatus, "shop.payment_status", "payment status" {
        #[default]
        Pending => ("pending", "Awaiting payment"),
        Paid => ("paid", "Paid"),
        Failed => ("failed", "Failed"),
        Refunded => ("refunded", "Refunded"),
    }
}

impl PaymentStatus {
    /// Whether a payment may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Failed)
                | (Self::Failed, Self::Paid)
                | (Self::Paid, Self::Refunded)
        )
    }
}

define_status! {
    /// Catalog visibility of a product.
    #[derive(Default)]
    ProductStatus, "shop.product_status", "product status" {
        #[default]
        Draft => ("draft", "Draft"),
        Active => ("active", "Active"),
        Archived => ("archived", "Archived"),
    }
}

define_status! {
    /// Progress of a quote request.
    #[derive(Default)]
    QuoteStatus, "shop.quote_status", "quote status" {
        #[default]
        New => ("new", "New"),
        Reviewing => ("reviewing", "Reviewing"),
        Quoted => ("quoted", "Quoted"),
        Accepted => ("accepted", "Accepted"),
        Rejected => ("rejected", "Rejected"),
    }
}

impl QuoteStatus {
    /// Quotes still waiting on staff.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::New | Self::Reviewing)
    }
}

define_status! {
    /// Return merchandise authorization lifecycle.
    #[derive(Default)]
    ReturnStatus, "shop.return_status", "return status" {
        #[default]
        Requested => ("requested", "Requested"),
        Approved => ("approved", "Approved"),
        Rejected => ("rejected", "Rejected"),
        Received => ("received", "Received"),
        Refunded => ("refunded", "Refunded"),
    }
}

impl ReturnStatus {
    /// Whether a return may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Received)
                | (Self::Received, Self::Refunded)
        )
    }

    /// Returns still needing staff action.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Requested | Self::Approved | Self::Received)
    }
}

define_status! {
    /// State of a registered warranty.
    #[derive(Default)]
    WarrantyStatus, "shop.warranty_status", "warranty status" {
        #[default]
        Active => ("active", "Active"),
        Claimed => ("claimed", "Claimed"),
        Expired => ("expired", "Expired"),
        Void => ("void", "Void"),
    }
}

impl WarrantyStatus {
    /// The status a customer should see on `today`.
    ///
    /// Stored rows are not rewritten when they lapse, so an `active` warranty
    /// past its expiry date reads as `expired`.
    #[must_use]
    pub fn effective(self, expires_on: chrono::NaiveDate, today: chrono::NaiveDate) -> Self {
        if self == Self::Active && today > expires_on {
            Self::Expired
        } else {
            self
        }
    }
}

define_status! {
    /// Account role.
    #[derive(Default)]
    UserRole, "shop.user_role", "user role" {
        #[default]
        Customer => ("customer", "Customer"),
        /// Read-only back-office access.
        Staff => ("staff", "Staff"),
        /// Full back-office access.
        Admin => ("admin", "Admin"),
    }
}

impl UserRole {
    /// Whether the role may sign in to the back-office.
    #[must_use]
    pub const fn can_access_admin(self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }

    /// Whether the role may create, change or delete records.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::Admin)
    }
}

define_status! {
    /// How a coupon reduces the order subtotal.
    DiscountType, "shop.discount_type", "discount type" {
        Percentage => ("percentage", "Percentage"),
        FixedAmount => ("fixed_amount", "Fixed amount"),
    }
}

define_status! {
    /// Value type of a product attribute.
    AttributeKind, "shop.attribute_kind", "attribute kind" {
        Text => ("text", "Text"),
        Number => ("number", "Number"),
        Select => ("select", "Select"),
        Boolean => ("boolean", "Yes / No"),
    }
}

define_status! {
    /// Rendering style of a content block.
    ContentBlockType, "shop.content_block_type", "content block type" {
        Banner => ("banner", "Banner"),
        Hero => ("hero", "Hero"),
        Text => ("text", "Text"),
        Html => ("html", "HTML"),
    }
}

define_status! {
    /// Where on the storefront a content block appears.
    Placement, "shop.placement", "placement" {
        Home => ("home", "Home page"),
        Product => ("product", "Product page"),
        Checkout => ("checkout", "Checkout"),
        Footer => ("footer", "Footer"),
    }
}

/// Stock level shown to customers. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Classify `available` units against a reorder level.
    #[must_use]
    pub const fn from_levels(available: i64, reorder_level: i64) -> Self {
        if available <= 0 {
            Self::OutOfStock
        } else if available <= reorder_level {
            Self::LowStock
        } else {
            Self::InStock
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InStock => "In stock",
            Self::LowStock => "Low stock",
            Self::OutOfStock => "Out of stock",
        }
    }

    /// Whether the product can be added to a cart.
    #[must_use]
    pub const fn is_purchasable(self) -> bool {
        !matches!(self, Self::OutOfStock)
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::InStock => "in_stock",
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_order_status_forward_only() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Refunded));
        assert!(!Shipped.can_transition_to(Pending));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_orders_have_no_transitions() {
        for current in OrderStatus::ALL.iter().filter(|s| s.is_terminal()) {
            assert!(OrderStatus::ALL.iter().all(|next| !current.can_transition_to(*next)));
        }
        assert!(!OrderStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_payment_status_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Refunded));
        assert!(!Failed.can_transition_to(Failed));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Pending));
    }

    #[test]
    fn test_return_status_transitions() {
        use ReturnStatus::*;
        assert!(Requested.can_transition_to(Approved));
        assert!(Requested.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Received));
        assert!(Received.can_transition_to(Refunded));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Requested.can_transition_to(Refunded));
    }

    #[test]
    fn test_round_trip_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        assert_eq!(
            "fixed_amount".parse::<DiscountType>().unwrap(),
            DiscountType::FixedAmount
        );
    }

    #[test]
    fn test_unknown_variant_error() {
        let err = "lost".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid order status: lost");
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&ContentBlockType::Html).unwrap();
        assert_eq!(json, "\"html\"");
        let role: UserRole = serde_json::from_str("\"staff\"").unwrap();
        assert_eq!(role, UserRole::Staff);
    }

    #[test]
    fn test_roles() {
        assert!(!UserRole::Customer.can_access_admin());
        assert!(UserRole::Staff.can_access_admin());
        assert!(!UserRole::Staff.can_write());
        assert!(UserRole::Admin.can_write());
    }

    #[test]
    fn test_warranty_effective_status() {
        let expires = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let before = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let after = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(
            WarrantyStatus::Active.effective(expires, before),
            WarrantyStatus::Active
        );
        assert_eq!(
            WarrantyStatus::Active.effective(expires, after),
            WarrantyStatus::Expired
        );
        assert_eq!(
            WarrantyStatus::Void.effective(expires, after),
            WarrantyStatus::Void
        );
    }

    #[test]
    fn test_stock_status_levels() {
        assert_eq!(StockStatus::from_levels(0, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_levels(-2, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_levels(5, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::from_levels(6, 5), StockStatus::InStock);
        assert!(!StockStatus::OutOfStock.is_purchasable());
    }
}
