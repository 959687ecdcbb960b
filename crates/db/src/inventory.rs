//! Inventory repository.
//!
//! Stock is tracked per product and location. `reserved` counts units held by
//! unshipped orders; `quantity - reserved` is what can still be sold.
//! Reservations use a conditional `UPDATE` so concurrent checkouts cannot
//! push `reserved` past `quantity`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{InventoryItemId, ProductId, StockStatus};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, required};

/// Stock of one product at one location.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub location: String,
    pub quantity: i32,
    pub reserved: i32,
    pub reorder_level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Units that can still be sold.
    #[must_use]
    pub const fn available(&self) -> i32 {
        self.quantity - self.reserved
    }

    #[must_use]
    pub fn stock_status(&self) -> StockStatus {
        StockStatus::from_levels(i64::from(self.available()), i64::from(self.reorder_level))
    }
}

/// Aggregate stock for a product across locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockLevel {
    pub available: i64,
    pub reorder_level: i64,
}

impl StockLevel {
    #[must_use]
    pub const fn status(&self) -> StockStatus {
        StockStatus::from_levels(self.available, self.reorder_level)
    }
}

/// Create/update payload for an inventory row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryInput {
    pub product_id: ProductId,
    #[serde(default = "default_location")]
    pub location: String,
    pub quantity: i32,
    #[serde(default)]
    pub reorder_level: i32,
}

fn default_location() -> String {
    "main".to_owned()
}

impl InventoryInput {
    fn validate(&self) -> Result<String, RepositoryError> {
        let location = required(&self.location, "location")?;
        if self.quantity < 0 {
            return Err(RepositoryError::invalid("quantity cannot be negative"));
        }
        if self.reorder_level < 0 {
            return Err(RepositoryError::invalid("reorder level cannot be negative"));
        }
        Ok(location)
    }
}

const SELECT: &str = "i.id, i.product_id, p.name AS product_name, p.sku AS product_sku, \
                      i.location, i.quantity, i.reserved, i.reorder_level, \
                      i.created_at, i.updated_at";

const FROM: &str = "shop.inventory_items i JOIN shop.products p ON p.id = i.product_id";

const LISTING: ListSpec = ListSpec {
    select: SELECT,
    from: FROM,
    search: &["p.name", "p.sku", "i.location"],
    status: StatusColumn::None,
    order_by: "(i.quantity - i.reserved) ASC, p.name ASC",
};

/// Repository for inventory database operations.
pub struct InventoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List inventory rows, lowest availability first.
    ///
    /// `?status=low` limits the list to rows at or below their reorder level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<InventoryItem>, RepositoryError> {
        if query.status_filter() == Some("low") {
            let low = ListSpec {
                from: "shop.inventory_items i JOIN shop.products p ON p.id = i.product_id \
                       AND i.quantity - i.reserved <= i.reorder_level",
                ..LISTING
            };
            return fetch_page(self.pool, &low, query).await;
        }
        fetch_page(self.pool, &LISTING, query).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: InventoryItemId) -> Result<Option<InventoryItem>, RepositoryError> {
        let row = sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {SELECT} FROM {FROM} WHERE i.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Sellable units of a product summed over locations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn available_for_product(&self, product_id: ProductId) -> Result<StockLevel, RepositoryError> {
        let level = sqlx::query_as::<_, StockLevel>(
            "SELECT COALESCE(SUM(quantity - reserved), 0)::BIGINT AS available, \
                    COALESCE(SUM(reorder_level), 0)::BIGINT AS reorder_level \
             FROM shop.inventory_items WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(level)
    }

    /// Stock levels for several products. Products without rows are absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn available_for_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, StockLevel>, RepositoryError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        #[derive(sqlx::FromRow)]
        struct Row {
            product_id: ProductId,
            #[sqlx(flatten)]
            level: StockLevel,
        }

        let raw: Vec<i32> = product_ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, Row>(
            "SELECT product_id, \
                    SUM(quantity - reserved)::BIGINT AS available, \
                    SUM(reorder_level)::BIGINT AS reorder_level \
             FROM shop.inventory_items \
             WHERE product_id = ANY($1) \
             GROUP BY product_id",
        )
        .bind(raw)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| (r.product_id, r.level)).collect())
    }

    /// Rows at or below their reorder level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.inventory_items WHERE quantity - reserved <= reorder_level",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product already has a row
    /// for this location.
    pub async fn create(&self, input: &InventoryInput) -> Result<InventoryItem, RepositoryError> {
        let location = input.validate()?;
        let id = sqlx::query_scalar::<_, InventoryItemId>(
            "INSERT INTO shop.inventory_items (product_id, location, quantity, reorder_level) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(input.product_id)
        .bind(&location)
        .bind(input.quantity)
        .bind(input.reorder_level)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace quantity, location and reorder level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if the new quantity is below the
    /// reserved count, `RepositoryError::NotFound` if the row does not exist.
    pub async fn update(
        &self,
        id: InventoryItemId,
        input: &InventoryInput,
    ) -> Result<InventoryItem, RepositoryError> {
        let location = input.validate()?;
        let updated = sqlx::query_scalar::<_, InventoryItemId>(
            "UPDATE shop.inventory_items \
             SET product_id = $2, location = $3, quantity = $4, reorder_level = $5, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id)
        .bind(input.product_id)
        .bind(&location)
        .bind(input.quantity)
        .bind(input.reorder_level)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;
        if updated.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Add `delta` (possibly negative) to the on-hand quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if the result would be negative
    /// or below the reserved count.
    pub async fn adjust(&self, id: InventoryItemId, delta: i32) -> Result<InventoryItem, RepositoryError> {
        let updated = sqlx::query_scalar::<_, InventoryItemId>(
            "UPDATE shop.inventory_items \
             SET quantity = quantity + $2, updated_at = NOW() \
             WHERE id = $1 AND quantity + $2 >= 0 AND quantity + $2 >= reserved \
             RETURNING id",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;

        match updated {
            Some(_) => self.get(id).await?.ok_or(RepositoryError::NotFound),
            None => match self.get(id).await? {
                Some(item) => Err(RepositoryError::invalid(format!(
                    "cannot adjust by {delta}: {} on hand, {} reserved",
                    item.quantity, item.reserved
                ))),
                None => Err(RepositoryError::NotFound),
            },
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row does not exist.
    pub async fn delete(&self, id: InventoryItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.inventory_items WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set stock for a product at a location, creating the row if needed.
    /// Used by the seeder.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input.
    pub async fn upsert(&self, input: &InventoryInput) -> Result<(), RepositoryError> {
        let location = input.validate()?;
        sqlx::query(
            "INSERT INTO shop.inventory_items (product_id, location, quantity, reorder_level) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (product_id, location) DO UPDATE SET \
                 quantity = GREATEST(EXCLUDED.quantity, shop.inventory_items.reserved), \
                 reorder_level = EXCLUDED.reorder_level, \
                 updated_at = NOW()",
        )
        .bind(input.product_id)
        .bind(&location)
        .bind(input.quantity)
        .bind(input.reorder_level)
        .execute(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;
        Ok(())
    }

    /// Reserve `quantity` units of a product inside an open transaction.
    ///
    /// Every location holding the product is locked, then units are taken
    /// from the locations with the most sellable stock first. Returns the
    /// share reserved at each location.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when all locations together do not
    /// have enough stock.
    pub async fn reserve_for_order(
        conn: &mut PgConnection,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Vec<(InventoryItemId, i32)>, RepositoryError> {
        // Locked in id order so concurrent checkouts never deadlock.
        let free = sqlx::query_as::<_, (InventoryItemId, i32)>(
            "SELECT id, quantity - reserved FROM shop.inventory_items \
             WHERE product_id = $1 \
             ORDER BY id \
             FOR UPDATE",
        )
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

        let allocations = allocate(free, quantity).ok_or_else(|| {
            RepositoryError::Conflict(format!(
                "not enough stock for product {product_id} (requested {quantity})"
            ))
        })?;

        for &(id, share) in &allocations {
            sqlx::query(
                "UPDATE shop.inventory_items \
                 SET reserved = reserved + $2, updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(id)
            .bind(share)
            .execute(&mut *conn)
            .await?;
        }
        Ok(allocations)
    }

    /// Give back a reservation (order cancelled).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn release(
        conn: &mut PgConnection,
        id: InventoryItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE shop.inventory_items \
             SET reserved = GREATEST(reserved - $2, 0), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Turn a reservation into a shipment: both counters drop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn fulfill(
        conn: &mut PgConnection,
        id: InventoryItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE shop.inventory_items \
             SET quantity = GREATEST(quantity - $2, 0), \
                 reserved = GREATEST(reserved - $2, 0), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

/// Split `quantity` over `(location, free units)` pairs, largest free stock
/// first. `None` when the locations together fall short.
fn allocate(mut free: Vec<(InventoryItemId, i32)>, quantity: i32) -> Option<Vec<(InventoryItemId, i32)>> {
    if quantity <= 0 {
        return None;
    }
    free.retain(|&(_, units)| units > 0);
    free.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut remaining = quantity;
    let mut allocations = Vec::new();
    for (id, units) in free {
        if remaining == 0 {
            break;
        }
        let share = units.min(remaining);
        allocations.push((id, share));
        remaining -= share;
    }
    (remaining == 0).then_some(allocations)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_input_defaults_location() {
        let input: InventoryInput =
            serde_json::from_str(r#"{"product_id": 3, "quantity": 10}"#).unwrap();
        assert_eq!(input.location, "main");
        assert_eq!(input.reorder_level, 0);
        assert_eq!(input.validate().unwrap(), "main");
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let input = InventoryInput {
            product_id: ProductId::new(1),
            location: "main".to_owned(),
            quantity: -1,
            reorder_level: 0,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_stock_level_status() {
        let level = StockLevel {
            available: 2,
            reorder_level: 5,
        };
        assert_eq!(level.status(), StockStatus::LowStock);
        assert_eq!(StockLevel::default().status(), StockStatus::OutOfStock);
    }

    fn loc(id: i32) -> InventoryItemId {
        InventoryItemId::new(id)
    }

    #[test]
    fn test_allocate_spans_locations() {
        let plan = allocate(vec![(loc(1), 3), (loc(2), 3)], 5).unwrap();
        assert_eq!(plan, vec![(loc(1), 3), (loc(2), 2)]);
    }

    #[test]
    fn test_allocate_prefers_largest_location() {
        let plan = allocate(vec![(loc(1), 2), (loc(2), 8), (loc(3), 0)], 4).unwrap();
        assert_eq!(plan, vec![(loc(2), 4)]);
    }

    #[test]
    fn test_allocate_short_or_empty() {
        assert!(allocate(vec![(loc(1), 3), (loc(2), 1)], 5).is_none());
        assert!(allocate(Vec::new(), 1).is_none());
        assert!(allocate(vec![(loc(1), 3)], 0).is_none());
    }

    #[test]
    fn test_allocate_ignores_oversold_rows() {
        let plan = allocate(vec![(loc(1), -2), (loc(2), 3)], 3).unwrap();
        assert_eq!(plan, vec![(loc(2), 3)]);
    }
}
