//! Emporium database layer.
//!
//! One `PostgreSQL` database, schema `shop`, shared by the storefront, the
//! back-office and the CLI. Each entity has a repository borrowing the pool:
//!
//! ```rust,ignore
//! let products = ProductRepository::new(&pool);
//! let page = products.list(&ListQuery::default()).await?;
//! ```
//!
//! # Migrations
//!
//! Migrations live in `crates/db/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod attributes;
pub mod brands;
pub mod categories;
pub mod content_blocks;
pub mod coupons;
pub mod deals;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod quotes;
pub mod returns;
pub mod shipping;
pub mod users;
pub mod warranties;

mod listing;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use attributes::{Attribute, AttributeInput, AttributeRepository};
pub use brands::{Brand, BrandInput, BrandRepository};
pub use categories::{Category, CategoryInput, CategoryRepository};
pub use content_blocks::{ContentBlock, ContentBlockInput, ContentBlockRepository};
pub use coupons::{Coupon, CouponInput, CouponRepository};
pub use deals::{Deal, DealInput, DealRepository};
pub use inventory::{InventoryInput, InventoryItem, InventoryRepository, StockLevel};
pub use orders::{
    NewOrder, NewOrderLine, Order, OrderItem, OrderRepository, ShippingAddress, StatusChange,
};
pub use products::{CatalogFilter, CatalogSort, Product, ProductInput, ProductRepository};
pub use quotes::{NewQuote, Quote, QuoteInput, QuoteItem, QuoteRepository};
pub use returns::{NewReturn, Return, ReturnInput, ReturnRepository};
pub use shipping::{ShippingMethod, ShippingMethodInput, ShippingMethodRepository};
pub use users::{NewUser, User, UserInput, UserRepository};
pub use warranties::{NewWarranty, Warranty, WarrantyInput, WarrantyRepository};

/// Embedded migrations for the `shop` schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique slug).
    #[error("{0}")]
    Conflict(String),

    /// Input rejected before or by the database.
    #[error("{0}")]
    Validation(String),
}

impl RepositoryError {
    /// Shorthand for a validation failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Map errors from INSERT/UPDATE/DELETE statements.
    ///
    /// Unique violations become [`Conflict`](Self::Conflict); foreign key
    /// and check violations become [`Validation`](Self::Validation).
    #[must_use]
    pub fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let constraint = db.constraint().unwrap_or_default();
            if db.is_unique_violation() {
                return Self::Conflict(format!(
                    "{} already exists",
                    constraint_subject(constraint)
                ));
            }
            if db.is_foreign_key_violation() {
                return Self::Validation(
                    "a referenced record does not exist or is still in use".to_owned(),
                );
            }
            if db.is_check_violation() {
                return Self::Validation(format!("value rejected by {constraint}"));
            }
        }
        Self::Database(err)
    }
}

/// Tables in the `shop` schema, longest first so prefixes match correctly.
const TABLES: &[&str] = &[
    "shipping_methods",
    "inventory_items",
    "content_blocks",
    "order_items",
    "categories",
    "attributes",
    "warranties",
    "products",
    "returns",
    "coupons",
    "orders",
    "quotes",
    "brands",
    "deals",
    "users",
];

/// Turn `products_sku_key` into `a record with this sku`.
fn constraint_subject(constraint: &str) -> String {
    let field = constraint.strip_suffix("_key").and_then(|rest| {
        TABLES
            .iter()
            .find_map(|table| rest.strip_prefix(table)?.strip_prefix('_'))
    });
    let field = field.filter(|field| !field.is_empty());
    match field {
        Some(field) => format!("a record with this {}", field.replace('_', " ")),
        None => "a matching record".to_owned(),
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Create a pool that connects on first use.
///
/// Used by router tests that never reach the database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL cannot be parsed.
pub fn create_lazy_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy(database_url.expose_secret())
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Trim an optional text field, mapping blank to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Require a non-blank text field.
pub(crate) fn required(value: &str, field: &str) -> Result<String, RepositoryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RepositoryError::invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_subject() {
        assert_eq!(
            constraint_subject("products_sku_key"),
            "a record with this sku"
        );
        assert_eq!(
            constraint_subject("orders_order_number_key"),
            "a record with this order number"
        );
        assert_eq!(
            constraint_subject("shipping_methods_name_key"),
            "a record with this name"
        );
        assert_eq!(
            constraint_subject("inventory_items_product_id_location_key"),
            "a record with this product id location"
        );
        assert_eq!(constraint_subject("weird"), "a matching record");
    }

    #[test]
    fn test_required_and_non_blank() {
        assert_eq!(required("  Widget ", "name").unwrap_or_default(), "Widget");
        assert!(matches!(
            required("   ", "name"),
            Err(RepositoryError::Validation(msg)) if msg == "name is required"
        ));
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" x ")), Some("x".to_owned()));
        assert_eq!(non_blank(None), None);
    }
}
