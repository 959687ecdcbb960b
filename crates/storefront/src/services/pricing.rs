//! Order pricing shared by the checkout pages and the public order API.
//!
//! Prices always come from the database at the moment of pricing: the
//! product's current price, undercut by a live flash deal that still has
//! enough units for the line. Totals come from
//! [`emporium_core::pricing::compute_totals`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use emporium_core::pricing::{
    CouponRejection, OrderTotals, PricedLine, PricingError, compute_totals,
};
use emporium_core::types::money::round_cents;
use emporium_core::{DealId, Email, ProductId, ShippingMethodId};
use emporium_db::{
    Coupon, CouponRepository, Deal, DealRepository, InventoryRepository, NewOrder, NewOrderLine,
    Product, ProductRepository, ShippingAddress, ShippingMethod, ShippingMethodRepository,
    StockLevel,
};

use crate::error::AppError;

/// A product and quantity the customer wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A requested line with its current price and stock.
#[derive(Debug, Clone)]
pub struct QuotedLine {
    pub product: Product,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub deal_id: Option<DealId>,
    pub stock: StockLevel,
}

impl QuotedLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_cents(self.unit_price * Decimal::from(self.quantity))
    }

    /// Why this line cannot be bought as requested, if anything.
    #[must_use]
    pub fn problem(&self) -> Option<String> {
        if !self.product.is_visible() {
            return Some(format!("{} is no longer available", self.product.name));
        }
        let available = self.stock.available;
        if available <= 0 {
            return Some(format!("{} is out of stock", self.product.name));
        }
        if available < i64::from(self.quantity) {
            return Some(format!("only {available} left of {}", self.product.name));
        }
        None
    }

    fn priced(&self) -> PricedLine {
        PricedLine {
            product_id: self.product.id,
            product_name: self.product.name.clone(),
            sku: self.product.sku.clone(),
            unit_price: self.unit_price,
            quantity: self.quantity,
            from_deal: self.deal_id.is_some(),
        }
    }
}

/// A fully priced order, ready to be placed.
#[derive(Debug, Clone)]
pub struct PricedOrder {
    pub lines: Vec<QuotedLine>,
    pub shipping_method: ShippingMethod,
    pub coupon: Option<Coupon>,
    pub totals: OrderTotals,
}

impl PricedOrder {
    /// The repository payload for this order.
    #[must_use]
    pub fn into_new_order(
        self,
        email: Email,
        shipping_address: ShippingAddress,
        notes: Option<String>,
    ) -> NewOrder {
        NewOrder {
            email,
            shipping_address,
            shipping_method_id: self.shipping_method.id,
            shipping_method_name: self.shipping_method.name.clone(),
            coupon: self.coupon.map(|c| (c.id, c.code)),
            totals: self.totals,
            notes,
            lines: self
                .lines
                .iter()
                .map(|line| NewOrderLine {
                    line: line.priced(),
                    deal_id: line.deal_id,
                })
                .collect(),
        }
    }
}

/// Combine repeated products, keeping first-seen order.
#[must_use]
pub fn merge_requests(requests: &[LineRequest]) -> Vec<LineRequest> {
    let mut merged: Vec<LineRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        match merged.iter_mut().find(|m| m.product_id == request.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(request.quantity),
            None => merged.push(*request),
        }
    }
    merged
}

/// The cheapest live deal that beats `base` and has stock for `quantity`.
#[must_use]
pub fn best_deal<'a>(
    deals: &[&'a Deal],
    base: Decimal,
    quantity: i32,
    now: DateTime<Utc>,
) -> Option<&'a Deal> {
    deals
        .iter()
        .copied()
        .filter(|deal| {
            let rule = deal.rule();
            rule.is_live(now)
                && rule.remaining().is_none_or(|left| left >= quantity)
                && deal.deal_price < base
        })
        .min_by_key(|deal| deal.deal_price)
}

/// Price and stock-check requested lines.
///
/// Unknown products are skipped; callers that need every line compare
/// lengths.
///
/// # Errors
///
/// Returns `AppError::Database` if a lookup fails.
pub async fn quote_lines(
    pool: &PgPool,
    requests: &[LineRequest],
    now: DateTime<Utc>,
) -> Result<Vec<QuotedLine>, AppError> {
    let requests = merge_requests(requests);
    let ids: Vec<ProductId> = requests.iter().map(|r| r.product_id).collect();

    let products: HashMap<ProductId, Product> = ProductRepository::new(pool)
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let stock = InventoryRepository::new(pool)
        .available_for_products(&ids)
        .await?;
    let deals = DealRepository::new(pool).active(now).await?;

    let mut lines = Vec::with_capacity(requests.len());
    for request in requests {
        let Some(product) = products.get(&request.product_id) else {
            continue;
        };
        let candidates: Vec<&Deal> = deals
            .iter()
            .filter(|d| d.product_id == product.id)
            .collect();
        let deal = best_deal(&candidates, product.price, request.quantity, now);
        lines.push(QuotedLine {
            product: product.clone(),
            quantity: request.quantity,
            unit_price: deal.map_or(product.price, |d| d.deal_price),
            deal_id: deal.map(|d| d.id),
            stock: stock.get(&product.id).copied().unwrap_or_default(),
        });
    }
    Ok(lines)
}

/// Price a whole order.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for unknown or unavailable products or an
/// inactive shipping method, `AppError::Pricing` for bad quantities or a
/// coupon that does not apply.
pub async fn price_order(
    pool: &PgPool,
    requests: &[LineRequest],
    shipping_method_id: ShippingMethodId,
    coupon_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PricedOrder, AppError> {
    let wanted = merge_requests(requests).len();
    let lines = quote_lines(pool, requests, now).await?;
    if lines.len() != wanted {
        return Err(AppError::BadRequest(
            "one or more products do not exist".to_string(),
        ));
    }
    if let Some(problem) = lines.iter().find_map(QuotedLine::problem) {
        return Err(AppError::BadRequest(problem));
    }

    let shipping_method = ShippingMethodRepository::new(pool)
        .get(shipping_method_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or_else(|| AppError::BadRequest("shipping method is not available".to_string()))?;

    let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Some(
            CouponRepository::new(pool)
                .get_by_code(code)
                .await?
                .ok_or(PricingError::Coupon(CouponRejection::NotFound))?,
        ),
        None => None,
    };

    let priced: Vec<PricedLine> = lines.iter().map(QuotedLine::priced).collect();
    let totals = compute_totals(
        &priced,
        coupon.as_ref().map(Coupon::rule).as_ref(),
        &shipping_method.rule(),
        now,
    )?;

    Ok(PricedOrder {
        lines,
        shipping_method,
        coupon,
        totals,
    })
}
