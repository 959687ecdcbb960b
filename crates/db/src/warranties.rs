//! Warranty registration repository.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::numbers::{self, DocumentKind};
use emporium_core::{Email, OrderId, ProductId, WarrantyId, WarrantyStatus};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, non_blank};

const NUMBER_ATTEMPTS: usize = 5;

/// A registered product warranty.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Warranty {
    pub id: WarrantyId,
    pub warranty_number: String,
    pub product_id: ProductId,
    pub product_name: String,
    pub order_id: Option<OrderId>,
    pub order_number: Option<String>,
    pub customer_email: String,
    pub serial_number: Option<String>,
    pub purchase_date: NaiveDate,
    pub expires_on: NaiveDate,
    pub status: WarrantyStatus,
    pub claim_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Warranty {
    /// Status as of `today`; lapsed active warranties read as expired.
    #[must_use]
    pub fn effective_status(&self, today: NaiveDate) -> WarrantyStatus {
        self.status.effective(self.expires_on, today)
    }
}

/// Expiry date for a warranty of `months` bought on `purchase_date`.
///
/// Month ends clamp, so a one-year warranty bought on 29 February ends on
/// 28 February.
#[must_use]
pub fn expiry_for(purchase_date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let months = u32::try_from(months).ok()?;
    purchase_date.checked_add_months(Months::new(months))
}

/// A customer's warranty registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWarranty {
    pub product_id: ProductId,
    pub customer_email: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub purchase_date: NaiveDate,
    /// Order the product came from, if bought here.
    #[serde(default)]
    pub order_number: Option<String>,
}

/// Back-office create/edit of a warranty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarrantyInput {
    pub product_id: ProductId,
    pub customer_email: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub status: WarrantyStatus,
    #[serde(default)]
    pub claim_description: Option<String>,
}

impl From<&WarrantyInput> for NewWarranty {
    fn from(input: &WarrantyInput) -> Self {
        Self {
            product_id: input.product_id,
            customer_email: input.customer_email.clone(),
            serial_number: input.serial_number.clone(),
            purchase_date: input.purchase_date,
            order_number: input.order_number.clone(),
        }
    }
}

/// Registration fields after validation against products and orders.
struct Resolved {
    email: Email,
    order_id: Option<OrderId>,
    expires_on: NaiveDate,
}

fn check_claim(status: WarrantyStatus, claim: Option<&str>) -> Result<(), RepositoryError> {
    if status == WarrantyStatus::Claimed && non_blank(claim).is_none() {
        return Err(RepositoryError::invalid(
            "a claim description is required to mark a warranty as claimed",
        ));
    }
    Ok(())
}

const SELECT: &str = "w.id, w.warranty_number, w.product_id, p.name AS product_name, w.order_id, \
                      o.order_number, w.customer_email, w.serial_number, w.purchase_date, \
                      w.expires_on, w.status, w.claim_description, w.created_at, w.updated_at";

const FROM: &str = "shop.warranties w \
                    JOIN shop.products p ON p.id = w.product_id \
                    LEFT JOIN shop.orders o ON o.id = w.order_id";

const LISTING: ListSpec = ListSpec {
    select: SELECT,
    from: FROM,
    search: &["w.warranty_number", "w.customer_email", "w.serial_number", "p.name"],
    status: StatusColumn::Enum("w.status"),
    order_by: "w.created_at DESC, w.id DESC",
};

/// Repository for warranty database operations.
pub struct WarrantyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WarrantyRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Warranty>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: WarrantyId) -> Result<Option<Warranty>, RepositoryError> {
        let row =
            sqlx::query_as::<_, Warranty>(&format!("SELECT {SELECT} FROM {FROM} WHERE w.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, number: &str) -> Result<Option<Warranty>, RepositoryError> {
        let row = sqlx::query_as::<_, Warranty>(&format!(
            "SELECT {SELECT} FROM {FROM} WHERE w.warranty_number = $1"
        ))
        .bind(number.trim().to_uppercase())
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Validate a registration and work out its expiry.
    async fn resolve(&self, request: &NewWarranty, today: NaiveDate) -> Result<Resolved, RepositoryError> {
        let email = Email::parse(&request.customer_email)
            .map_err(|e| RepositoryError::invalid(e.to_string()))?;
        if request.purchase_date > today {
            return Err(RepositoryError::invalid("purchase date cannot be in the future"));
        }

        let months = sqlx::query_scalar::<_, i32>(
            "SELECT warranty_months FROM shop.products WHERE id = $1",
        )
        .bind(request.product_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::invalid("unknown product"))?;
        if months <= 0 {
            return Err(RepositoryError::invalid("this product has no warranty"));
        }
        let expires_on = expiry_for(request.purchase_date, months)
            .ok_or_else(|| RepositoryError::invalid("purchase date out of range"))?;

        let order_id = match non_blank(request.order_number.as_deref()) {
            None => None,
            Some(number) => {
                let order = sqlx::query_as::<_, (OrderId, String)>(
                    "SELECT id, email FROM shop.orders WHERE order_number = $1",
                )
                .bind(number.to_uppercase())
                .fetch_optional(self.pool)
                .await?;
                match order {
                    Some((id, order_email)) if email.matches(&order_email) => Some(id),
                    _ => {
                        return Err(RepositoryError::invalid(
                            "order number does not match this email",
                        ));
                    }
                }
            }
        };

        Ok(Resolved {
            email,
            order_id,
            expires_on,
        })
    }

    /// Register a warranty; the expiry follows the product's warranty term.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for an unknown product, a
    /// product without warranty, or an order that does not match the email.
    pub async fn create(&self, request: &NewWarranty) -> Result<Warranty, RepositoryError> {
        let resolved = self.resolve(request, Utc::now().date_naive()).await?;

        for _ in 0..NUMBER_ATTEMPTS {
            let number = numbers::generate(DocumentKind::Warranty, Utc::now());
            let inserted = sqlx::query_scalar::<_, WarrantyId>(
                "INSERT INTO shop.warranties \
                     (warranty_number, product_id, order_id, customer_email, serial_number, \
                      purchase_date, expires_on) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (warranty_number) DO NOTHING \
                 RETURNING id",
            )
            .bind(&number)
            .bind(request.product_id)
            .bind(resolved.order_id)
            .bind(resolved.email.as_str())
            .bind(non_blank(request.serial_number.as_deref()))
            .bind(request.purchase_date)
            .bind(resolved.expires_on)
            .fetch_optional(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
            if let Some(id) = inserted {
                tracing::info!(warranty_number = %number, "warranty registered");
                return self.get(id).await?.ok_or(RepositoryError::NotFound);
            }
        }
        Err(RepositoryError::Conflict(
            "could not allocate a warranty number".to_owned(),
        ))
    }

    /// Back-office create: register, then apply the requested status.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create) and [`update_status`](Self::update_status).
    pub async fn create_from_input(&self, input: &WarrantyInput) -> Result<Warranty, RepositoryError> {
        check_claim(input.status, input.claim_description.as_deref())?;
        let created = self.create(&NewWarranty::from(input)).await?;
        if input.status == WarrantyStatus::Active && input.claim_description.is_none() {
            return Ok(created);
        }
        self.update_status(created.id, input.status, input.claim_description.as_deref())
            .await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the warranty does not exist.
    pub async fn update(&self, id: WarrantyId, input: &WarrantyInput) -> Result<Warranty, RepositoryError> {
        check_claim(input.status, input.claim_description.as_deref())?;
        let resolved = self
            .resolve(&NewWarranty::from(input), Utc::now().date_naive())
            .await?;

        let result = sqlx::query(
            "UPDATE shop.warranties \
             SET product_id = $2, order_id = $3, customer_email = $4, serial_number = $5, \
                 purchase_date = $6, expires_on = $7, status = $8, claim_description = $9, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.product_id)
        .bind(resolved.order_id)
        .bind(resolved.email.as_str())
        .bind(non_blank(input.serial_number.as_deref()))
        .bind(input.purchase_date)
        .bind(resolved.expires_on)
        .bind(input.status)
        .bind(non_blank(input.claim_description.as_deref()))
        .execute(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Set the status, keeping the stored claim when none is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` when claiming without a
    /// description.
    pub async fn update_status(
        &self,
        id: WarrantyId,
        status: WarrantyStatus,
        claim_description: Option<&str>,
    ) -> Result<Warranty, RepositoryError> {
        let current = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        let claim = non_blank(claim_description).or(current.claim_description);
        check_claim(status, claim.as_deref())?;

        sqlx::query(
            "UPDATE shop.warranties \
             SET status = $2, claim_description = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(claim)
        .execute(self.pool)
        .await?;
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the warranty does not exist.
    pub async fn delete(&self, id: WarrantyId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.warranties WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_expiry_adds_months() {
        assert_eq!(expiry_for(date(2025, 1, 15), 12), Some(date(2026, 1, 15)));
        assert_eq!(expiry_for(date(2025, 1, 31), 1), Some(date(2025, 2, 28)));
        assert_eq!(expiry_for(date(2024, 2, 29), 12), Some(date(2025, 2, 28)));
        assert_eq!(expiry_for(date(2025, 1, 1), -1), None);
    }

    #[test]
    fn test_claim_needs_description() {
        assert!(check_claim(WarrantyStatus::Claimed, None).is_err());
        assert!(check_claim(WarrantyStatus::Claimed, Some("  ")).is_err());
        assert!(check_claim(WarrantyStatus::Claimed, Some("Screen cracked")).is_ok());
        assert!(check_claim(WarrantyStatus::Void, None).is_ok());
    }

    #[test]
    fn test_effective_status() {
        let now = Utc::now();
        let warranty = Warranty {
            id: WarrantyId::new(1),
            warranty_number: "WAR-20240101-ABCDEF".to_owned(),
            product_id: ProductId::new(1),
            product_name: "Kettle".to_owned(),
            order_id: None,
            order_number: None,
            customer_email: "a@example.com".to_owned(),
            serial_number: None,
            purchase_date: date(2024, 1, 1),
            expires_on: date(2025, 1, 1),
            status: WarrantyStatus::Active,
            claim_description: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(warranty.effective_status(date(2025, 1, 1)), WarrantyStatus::Active);
        assert_eq!(warranty.effective_status(date(2025, 1, 2)), WarrantyStatus::Expired);
    }
}
