//! Order repository.
//!
//! Orders are written once by checkout through [`OrderRepository::create_with_items`]
//! and afterwards only move through status transitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::numbers::{self, DocumentKind};
use emporium_core::pricing::{OrderTotals, PricedLine};
use emporium_core::{
    CouponId, DealId, Email, InventoryItemId, OrderId, OrderItemId, OrderStatus, PaymentStatus,
    ProductId, ShippingMethodId,
};

use crate::coupons::CouponRepository;
use crate::deals::DealRepository;
use crate::inventory::InventoryRepository;
use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, non_blank, required};

/// Attempts at finding an unused order number before giving up.
const NUMBER_ATTEMPTS: usize = 5;

/// Where an order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingAddress {
    pub customer_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Trim every field and reject missing required ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` naming the first missing field.
    pub fn normalized(&self) -> Result<Self, RepositoryError> {
        let country = required(&self.country, "country")?.to_uppercase();
        if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(RepositoryError::invalid(
                "country must be a two-letter ISO code",
            ));
        }
        Ok(Self {
            customer_name: required(&self.customer_name, "name")?,
            phone: non_blank(self.phone.as_deref()),
            address_line1: required(&self.address_line1, "address")?,
            address_line2: non_blank(self.address_line2.as_deref()),
            city: required(&self.city, "city")?,
            region: non_blank(self.region.as_deref()),
            postal_code: required(&self.postal_code, "postal code")?,
            country,
        })
    }

    /// Single-line rendering for tables and exports.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.address_line1.as_str()];
        if let Some(line2) = &self.address_line2 {
            parts.push(line2);
        }
        parts.push(&self.city);
        if let Some(region) = &self.region {
            parts.push(region);
        }
        parts.push(&self.postal_code);
        parts.push(&self.country);
        parts.join(", ")
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub email: String,
    #[sqlx(flatten)]
    pub shipping_address: ShippingAddress,
    pub shipping_method_id: Option<ShippingMethodId>,
    pub shipping_method_name: String,
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_total: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub const fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            discount_total: self.discount_total,
            shipping_total: self.shipping_total,
            total: self.total,
        }
    }
}

/// A line on a placed order. Product data is copied at purchase time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub deal_id: Option<DealId>,
    pub product_name: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A priced line ready to be written, with the deal that priced it.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub line: PricedLine,
    pub deal_id: Option<DealId>,
}

/// Everything checkout has validated and priced.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub email: Email,
    pub shipping_address: ShippingAddress,
    pub shipping_method_id: ShippingMethodId,
    pub shipping_method_name: String,
    pub coupon: Option<(CouponId, String)>,
    pub totals: OrderTotals,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

const LISTING: ListSpec = ListSpec {
    select: "*",
    from: "shop.orders",
    search: &["order_number", "email", "customer_name"],
    status: StatusColumn::Enum("status"),
    order_by: "created_at DESC, id DESC",
};

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Order>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, Order>("SELECT * FROM shop.orders WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, Order>("SELECT * FROM shop.orders WHERE order_number = $1")
            .bind(number.trim().to_uppercase())
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items_for(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM shop.order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Most recent orders for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, Order>(
            "SELECT * FROM shop.orders ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shop.orders")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_status(&self, status: OrderStatus) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shop.orders WHERE status = $1")
                .bind(status)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Sum of totals over paid orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn paid_revenue(&self) -> Result<Decimal, RepositoryError> {
        let sum = sqlx::query_scalar::<_, Option<Decimal>>(
            "SELECT SUM(total) FROM shop.orders WHERE payment_status = 'paid'",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(sum.unwrap_or_default())
    }

    /// Write an order with its items in one transaction.
    ///
    /// Stock is reserved line by line, the coupon use is counted and deal
    /// sales are recorded. Any failure rolls the whole order back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when stock, the coupon or a deal
    /// ran out, `RepositoryError::Validation` for inconsistent input.
    #[tracing::instrument(skip(self, order), fields(lines = order.lines.len()))]
    pub async fn create_with_items(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        if order.lines.is_empty() {
            return Err(RepositoryError::invalid("order has no items"));
        }
        let totals = order.totals;
        if totals.total != totals.subtotal - totals.discount_total + totals.shipping_total {
            return Err(RepositoryError::invalid("order totals do not add up"));
        }
        let address = order.shipping_address.normalized()?;

        let mut tx = self.pool.begin().await?;

        let order_id = insert_order(&mut *tx, order, &address).await?;

        for new_line in &order.lines {
            let line = &new_line.line;
            let allocations =
                InventoryRepository::reserve_for_order(&mut *tx, line.product_id, line.quantity)
                    .await?;
            let item_id = sqlx::query_scalar::<_, OrderItemId>(
                "INSERT INTO shop.order_items \
                     (order_id, product_id, deal_id, product_name, sku, unit_price, quantity, \
                      line_total) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 RETURNING id",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(new_line.deal_id)
            .bind(&line.product_name)
            .bind(&line.sku)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(line.line_total())
            .fetch_one(&mut *tx)
            .await
            .map_err(RepositoryError::from_write)?;

            for (inventory_item_id, quantity) in allocations {
                sqlx::query(
                    "INSERT INTO shop.order_item_allocations \
                         (order_item_id, inventory_item_id, quantity) \
                     VALUES ($1, $2, $3)",
                )
                .bind(item_id)
                .bind(inventory_item_id)
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
            }

            if let Some(deal_id) = new_line.deal_id {
                DealRepository::record_sale(&mut *tx, deal_id, line.quantity).await?;
            }
        }

        if let Some((coupon_id, _)) = &order.coupon {
            CouponRepository::increment_usage(&mut *tx, *coupon_id).await?;
        }

        let created = sqlx::query_as::<_, Order>("SELECT * FROM shop.orders WHERE id = $1")
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(order_number = %created.order_number, total = %created.total, "order placed");
        Ok(created)
    }

    /// Move an order to `next`, adjusting stock on shipment or cancellation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for a transition the order rules
    /// do not allow, `RepositoryError::NotFound` for an unknown order.
    pub async fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, RepositoryError> {
        self.apply_status_change(id, StatusChange::order(next)).await
    }

    /// Move the payment state of an order to `next`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for a transition the payment
    /// rules do not allow, `RepositoryError::NotFound` for an unknown order.
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        next: PaymentStatus,
    ) -> Result<Order, RepositoryError> {
        self.apply_status_change(id, StatusChange::payment(next)).await
    }

    /// Apply an order and/or payment status change as one unit.
    ///
    /// Both transitions are checked against the locked row before anything
    /// is written, so a rejected payment change leaves the order status (and
    /// its stock) untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` when either transition is not
    /// allowed or the change is empty, `RepositoryError::NotFound` for an
    /// unknown order.
    pub async fn apply_status_change(
        &self,
        id: OrderId,
        change: StatusChange,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (status, payment_status) = sqlx::query_as::<_, (OrderStatus, PaymentStatus)>(
            "SELECT status, payment_status FROM shop.orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        change.check(status, payment_status)?;

        if let Some(next @ (OrderStatus::Shipped | OrderStatus::Cancelled)) = change.status {
            settle_reservations(&mut *tx, id, next).await?;
        }

        let order = sqlx::query_as::<_, Order>(
            "UPDATE shop.orders \
             SET status = COALESCE($2, status), \
                 payment_status = COALESCE($3, payment_status), \
                 paid_at = CASE WHEN $3 = 'paid'::shop.payment_status THEN NOW() ELSE paid_at END, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(change.status)
        .bind(change.payment_status)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        if let Some(next) = change.status {
            tracing::info!(order_number = %order.order_number, from = %status, to = %next, "order status changed");
        }
        if let Some(next) = change.payment_status {
            tracing::info!(order_number = %order.order_number, from = %payment_status, to = %next, "payment status changed");
        }
        Ok(order)
    }
}

/// A requested move of an order's status, payment status, or both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusChange {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl StatusChange {
    #[must_use]
    pub const fn order(next: OrderStatus) -> Self {
        Self {
            status: Some(next),
            payment_status: None,
        }
    }

    #[must_use]
    pub const fn payment(next: PaymentStatus) -> Self {
        Self {
            status: None,
            payment_status: Some(next),
        }
    }

    /// Validate both moves against the current state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` naming the first disallowed move.
    pub fn check(&self, status: OrderStatus, payment_status: PaymentStatus) -> Result<(), RepositoryError> {
        if self.status.is_none() && self.payment_status.is_none() {
            return Err(RepositoryError::invalid("no status change requested"));
        }
        if let Some(next) = self.status.filter(|&next| !status.can_transition_to(next)) {
            return Err(RepositoryError::invalid(format!(
                "cannot change order status from {status} to {next}"
            )));
        }
        if let Some(next) = self
            .payment_status
            .filter(|&next| !payment_status.can_transition_to(next))
        {
            return Err(RepositoryError::invalid(format!(
                "cannot change payment status from {payment_status} to {next}"
            )));
        }
        Ok(())
    }
}

/// Insert the order row under a fresh order number.
async fn insert_order(
    conn: &mut PgConnection,
    order: &NewOrder,
    address: &ShippingAddress,
) -> Result<OrderId, RepositoryError> {
    for _ in 0..NUMBER_ATTEMPTS {
        let number = numbers::generate(DocumentKind::Order, Utc::now());
        let inserted = sqlx::query_scalar::<_, OrderId>(
            "INSERT INTO shop.orders \
                 (order_number, email, customer_name, phone, address_line1, address_line2, \
                  city, region, postal_code, country, shipping_method_id, shipping_method_name, \
                  coupon_code, subtotal, discount_total, shipping_total, total, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             ON CONFLICT (order_number) DO NOTHING \
             RETURNING id",
        )
        .bind(&number)
        .bind(order.email.as_str())
        .bind(&address.customer_name)
        .bind(&address.phone)
        .bind(&address.address_line1)
        .bind(&address.address_line2)
        .bind(&address.city)
        .bind(&address.region)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(order.shipping_method_id)
        .bind(&order.shipping_method_name)
        .bind(order.coupon.as_ref().map(|(_, code)| code.as_str()))
        .bind(order.totals.subtotal)
        .bind(order.totals.discount_total)
        .bind(order.totals.shipping_total)
        .bind(order.totals.total)
        .bind(non_blank(order.notes.as_deref()))
        .fetch_optional(&mut *conn)
        .await
        .map_err(RepositoryError::from_write)?;

        if let Some(id) = inserted {
            return Ok(id);
        }
        tracing::warn!(%number, "order number collision, retrying");
    }
    Err(RepositoryError::Conflict(
        "could not allocate an order number".to_owned(),
    ))
}

/// Ship (consume) or cancel (release) the stock reserved by an order, at
/// every location its lines were reserved from.
async fn settle_reservations(
    conn: &mut PgConnection,
    id: OrderId,
    next: OrderStatus,
) -> Result<(), RepositoryError> {
    let reservations = sqlx::query_as::<_, (InventoryItemId, i32)>(
        "SELECT a.inventory_item_id, a.quantity \
         FROM shop.order_item_allocations a \
         JOIN shop.order_items i ON i.id = a.order_item_id \
         WHERE i.order_id = $1 \
         ORDER BY a.inventory_item_id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    for (item_id, quantity) in reservations {
        if next == OrderStatus::Shipped {
            InventoryRepository::fulfill(&mut *conn, item_id, quantity).await?;
        } else {
            InventoryRepository::release(&mut *conn, item_id, quantity).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            customer_name: "  Ada Lovelace ".to_owned(),
            phone: Some(String::new()),
            address_line1: "12 Analytical Row".to_owned(),
            address_line2: None,
            city: "London".to_owned(),
            region: Some(" ".to_owned()),
            postal_code: "N1 9GU".to_owned(),
            country: "gb".to_owned(),
        }
    }

    #[test]
    fn test_address_normalized() {
        let normalized = address().normalized().unwrap();
        assert_eq!(normalized.customer_name, "Ada Lovelace");
        assert_eq!(normalized.phone, None);
        assert_eq!(normalized.region, None);
        assert_eq!(normalized.country, "GB");
    }

    #[test]
    fn test_address_requires_fields() {
        let mut missing_city = address();
        missing_city.city = "  ".to_owned();
        assert!(missing_city.normalized().is_err());

        let mut bad_country = address();
        bad_country.country = "United Kingdom".to_owned();
        assert!(bad_country.normalized().is_err());
    }

    #[test]
    fn test_one_line() {
        let normalized = address().normalized().unwrap();
        assert_eq!(
            normalized.one_line(),
            "12 Analytical Row, London, N1 9GU, GB"
        );
    }

    #[test]
    fn test_status_change_checks_both_moves() {
        let change = StatusChange {
            status: Some(OrderStatus::Shipped),
            payment_status: Some(PaymentStatus::Refunded),
        };
        // Shipping is allowed but refunding an unpaid order is not.
        let err = change
            .check(OrderStatus::Processing, PaymentStatus::Pending)
            .unwrap_err();
        assert!(err.to_string().contains("payment status"));
        assert!(change.check(OrderStatus::Processing, PaymentStatus::Paid).is_ok());
    }

    #[test]
    fn test_status_change_single_moves() {
        assert!(
            StatusChange::order(OrderStatus::Delivered)
                .check(OrderStatus::Pending, PaymentStatus::Paid)
                .is_err()
        );
        assert!(
            StatusChange::payment(PaymentStatus::Paid)
                .check(OrderStatus::Cancelled, PaymentStatus::Failed)
                .is_ok()
        );
        assert!(
            StatusChange::default()
                .check(OrderStatus::Pending, PaymentStatus::Pending)
                .is_err()
        );
    }
}
