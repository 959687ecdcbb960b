//! Pricing rules: coupons, flash deals, shipping and order totals.
//!
//! Everything here is pure so the storefront checkout and the public order
//! API price an order through exactly the same path. Amounts are rounded to
//! cents at each step.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::money::round_cents;
use crate::types::{DiscountType, ProductId};

/// Why a coupon cannot be applied.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("coupon code not found")]
    NotFound,
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon is not valid yet")]
    NotStarted,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon usage limit reached")]
    UsageLimitReached,
    #[error("order subtotal must be at least {minimum}")]
    BelowMinimum { minimum: Decimal },
}

/// Errors raised while pricing an order.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("order has no items")]
    EmptyOrder,
    #[error("quantity for {sku} must be between 1 and {max}")]
    InvalidQuantity { sku: String, max: i32 },
    #[error("price for {sku} cannot be negative")]
    NegativePrice { sku: String },
    #[error(transparent)]
    Coupon(#[from] CouponRejection),
}

/// Largest quantity of one product in a single order.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// The parts of a coupon that decide whether and how much it discounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRule {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CouponRule {
    /// Check the coupon can be used at `now`, ignoring the order amount.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRejection`] that applies.
    pub fn check_availability(&self, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if self.starts_at.is_some_and(|starts| now < starts) {
            return Err(CouponRejection::NotStarted);
        }
        if self.expires_at.is_some_and(|expires| now >= expires) {
            return Err(CouponRejection::Expired);
        }
        if self.max_uses.is_some_and(|max| self.used_count >= max) {
            return Err(CouponRejection::UsageLimitReached);
        }
        Ok(())
    }

    /// Discount this coupon gives on `subtotal` at `now`.
    ///
    /// The discount never exceeds the subtotal.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponRejection`] when the coupon is unusable or the
    /// subtotal is below its minimum.
    pub fn discount_for(
        &self,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Decimal, CouponRejection> {
        self.check_availability(now)?;
        if let Some(minimum) = self.min_order_amount
            && subtotal < minimum
        {
            return Err(CouponRejection::BelowMinimum { minimum });
        }

        let raw = match self.discount_type {
            DiscountType::Percentage => subtotal * self.value / Decimal::ONE_HUNDRED,
            DiscountType::FixedAmount => self.value,
        };
        Ok(round_cents(raw.clamp(Decimal::ZERO, subtotal)))
    }
}

/// Validate a coupon's value for its discount type.
///
/// # Errors
///
/// Returns a message suitable for a form error.
pub fn validate_coupon_value(discount_type: DiscountType, value: Decimal) -> Result<(), String> {
    match discount_type {
        DiscountType::Percentage if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED => {
            Err("percentage must be greater than 0 and at most 100".to_owned())
        }
        DiscountType::FixedAmount if value <= Decimal::ZERO => {
            Err("amount must be greater than 0".to_owned())
        }
        _ => Ok(()),
    }
}

/// A time-boxed price override for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRule {
    pub deal_price: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub quantity_limit: Option<i32>,
    pub sold_count: i32,
    pub is_active: bool,
}

impl DealRule {
    /// Units left at the deal price, `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<i32> {
        self.quantity_limit
            .map(|limit| (limit - self.sold_count).max(0))
    }

    /// Whether the deal price applies at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at <= now
            && now < self.ends_at
            && self.remaining().is_none_or(|left| left > 0)
    }
}

/// The price a customer pays for a product at `now`.
///
/// A live deal only applies when it undercuts the regular price.
#[must_use]
pub fn effective_price(base: Decimal, deal: Option<&DealRule>, now: DateTime<Utc>) -> Decimal {
    deal.filter(|d| d.is_live(now))
        .map_or(base, |d| d.deal_price.min(base))
}

/// Shipping cost rule for one method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRule {
    pub base_rate: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
}

impl ShippingRule {
    /// Cost of shipping an order whose discounted subtotal is `subtotal`.
    #[must_use]
    pub fn cost_for(&self, subtotal: Decimal) -> Decimal {
        match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => round_cents(self.base_rate.max(Decimal::ZERO)),
        }
    }
}

/// One priced order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    /// Whether `unit_price` came from a flash deal.
    pub from_deal: bool,
}

impl PricedLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_cents(self.unit_price * Decimal::from(self.quantity))
    }
}

/// Order totals. `total = subtotal - discount_total + shipping_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_total: Decimal,
    pub total: Decimal,
}

/// Price an order.
///
/// Free-shipping thresholds are checked against the subtotal after the
/// coupon discount.
///
/// # Errors
///
/// Returns a [`PricingError`] for empty orders, bad lines, or a coupon that
/// does not apply.
pub fn compute_totals(
    lines: &[PricedLine],
    coupon: Option<&CouponRule>,
    shipping: &ShippingRule,
    now: DateTime<Utc>,
) -> Result<OrderTotals, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyOrder);
    }
    for line in lines {
        if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
            return Err(PricingError::InvalidQuantity {
                sku: line.sku.clone(),
                max: MAX_LINE_QUANTITY,
            });
        }
        if line.unit_price < Decimal::ZERO {
            return Err(PricingError::NegativePrice {
                sku: line.sku.clone(),
            });
        }
    }

    let subtotal: Decimal = lines.iter().map(PricedLine::line_total).sum();
    let discount_total = match coupon {
        Some(rule) => rule.discount_for(subtotal, now)?,
        None => Decimal::ZERO,
    };
    let shipping_total = shipping.cost_for(subtotal - discount_total);

    Ok(OrderTotals {
        subtotal,
        discount_total,
        shipping_total,
        total: subtotal - discount_total + shipping_total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn coupon(discount_type: DiscountType, value: &str) -> CouponRule {
        CouponRule {
            code: "SAVE".to_owned(),
            discount_type,
            value: dec(value),
            min_order_amount: None,
            max_uses: None,
            used_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    fn line(price: &str, quantity: i32) -> PricedLine {
        PricedLine {
            product_id: ProductId::new(1),
            product_name: "Widget".to_owned(),
            sku: "W-1".to_owned(),
            unit_price: dec(price),
            quantity,
            from_deal: false,
        }
    }

    fn flat(rate: &str) -> ShippingRule {
        ShippingRule {
            base_rate: dec(rate),
            free_shipping_threshold: None,
        }
    }

    #[test]
    fn test_percentage_coupon() {
        let rule = coupon(DiscountType::Percentage, "15");
        assert_eq!(rule.discount_for(dec("80.00"), now()).unwrap(), dec("12.00"));
        assert_eq!(rule.discount_for(dec("33.33"), now()).unwrap(), dec("5.00"));
    }

    #[test]
    fn test_fixed_coupon_never_exceeds_subtotal() {
        let rule = coupon(DiscountType::FixedAmount, "25");
        assert_eq!(rule.discount_for(dec("10.00"), now()).unwrap(), dec("10.00"));
        assert_eq!(rule.discount_for(dec("40.00"), now()).unwrap(), dec("25"));
    }

    #[test]
    fn test_coupon_rejections() {
        let mut rule = coupon(DiscountType::FixedAmount, "5");
        rule.is_active = false;
        assert_eq!(
            rule.discount_for(dec("50"), now()),
            Err(CouponRejection::Inactive)
        );

        let mut rule = coupon(DiscountType::FixedAmount, "5");
        rule.starts_at = Some(now() + Duration::hours(1));
        assert_eq!(
            rule.discount_for(dec("50"), now()),
            Err(CouponRejection::NotStarted)
        );

        let mut rule = coupon(DiscountType::FixedAmount, "5");
        rule.expires_at = Some(now());
        assert_eq!(
            rule.discount_for(dec("50"), now()),
            Err(CouponRejection::Expired)
        );

        let mut rule = coupon(DiscountType::FixedAmount, "5");
        rule.max_uses = Some(3);
        rule.used_count = 3;
        assert_eq!(
            rule.discount_for(dec("50"), now()),
            Err(CouponRejection::UsageLimitReached)
        );

        let mut rule = coupon(DiscountType::FixedAmount, "5");
        rule.min_order_amount = Some(dec("60"));
        assert_eq!(
            rule.discount_for(dec("50"), now()),
            Err(CouponRejection::BelowMinimum {
                minimum: dec("60")
            })
        );
    }

    #[test]
    fn test_validate_coupon_value() {
        assert!(validate_coupon_value(DiscountType::Percentage, dec("100")).is_ok());
        assert!(validate_coupon_value(DiscountType::Percentage, dec("100.01")).is_err());
        assert!(validate_coupon_value(DiscountType::Percentage, Decimal::ZERO).is_err());
        assert!(validate_coupon_value(DiscountType::FixedAmount, dec("0.01")).is_ok());
        assert!(validate_coupon_value(DiscountType::FixedAmount, dec("-1")).is_err());
    }

    #[test]
    fn test_deal_window_and_limit() {
        let deal = DealRule {
            deal_price: dec("7.50"),
            starts_at: now() - Duration::hours(1),
            ends_at: now() + Duration::hours(1),
            quantity_limit: Some(10),
            sold_count: 4,
            is_active: true,
        };
        assert!(deal.is_live(now()));
        assert_eq!(deal.remaining(), Some(6));
        assert_eq!(effective_price(dec("10"), Some(&deal), now()), dec("7.50"));
        assert!(!deal.is_live(deal.ends_at));

        let sold_out = DealRule {
            sold_count: 10,
            ..deal.clone()
        };
        assert!(!sold_out.is_live(now()));
        assert_eq!(effective_price(dec("10"), Some(&sold_out), now()), dec("10"));

        let pricier = DealRule {
            deal_price: dec("12"),
            ..deal
        };
        assert_eq!(effective_price(dec("10"), Some(&pricier), now()), dec("10"));
    }

    #[test]
    fn test_free_shipping_threshold() {
        let rule = ShippingRule {
            base_rate: dec("6.95"),
            free_shipping_threshold: Some(dec("50")),
        };
        assert_eq!(rule.cost_for(dec("49.99")), dec("6.95"));
        assert_eq!(rule.cost_for(dec("50")), Decimal::ZERO);
    }

    #[test]
    fn test_compute_totals() {
        let lines = [line("19.99", 2), line("5.00", 1)];
        let rule = coupon(DiscountType::Percentage, "10");
        let totals = compute_totals(&lines, Some(&rule), &flat("4.50"), now()).unwrap();
        assert_eq!(totals.subtotal, dec("44.98"));
        assert_eq!(totals.discount_total, dec("4.50"));
        assert_eq!(totals.shipping_total, dec("4.50"));
        assert_eq!(totals.total, dec("44.98"));
        assert_eq!(
            totals.total,
            totals.subtotal - totals.discount_total + totals.shipping_total
        );
    }

    #[test]
    fn test_threshold_uses_discounted_subtotal() {
        let shipping = ShippingRule {
            base_rate: dec("5"),
            free_shipping_threshold: Some(dec("50")),
        };
        let rule = coupon(DiscountType::FixedAmount, "10");
        let totals =
            compute_totals(&[line("55", 1)], Some(&rule), &shipping, now()).unwrap();
        assert_eq!(totals.shipping_total, dec("5"));
        assert_eq!(totals.total, dec("50"));
    }

    #[test]
    fn test_compute_totals_rejects_bad_input() {
        assert_eq!(
            compute_totals(&[], None, &flat("1"), now()),
            Err(PricingError::EmptyOrder)
        );
        assert!(matches!(
            compute_totals(&[line("1", 0)], None, &flat("1"), now()),
            Err(PricingError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            compute_totals(&[line("1", 100)], None, &flat("1"), now()),
            Err(PricingError::InvalidQuantity { .. })
        ));
        let mut expired = coupon(DiscountType::FixedAmount, "1");
        expired.expires_at = Some(now() - Duration::days(1));
        assert_eq!(
            compute_totals(&[line("1", 1)], Some(&expired), &flat("1"), now()),
            Err(PricingError::Coupon(CouponRejection::Expired))
        );
    }
}
