//! Quote request repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::types::Json;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::numbers::{self, DocumentKind};
use emporium_core::{Email, ProductId, QuoteId, QuoteStatus};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, non_blank, required};

/// Most lines a single quote request may carry.
pub const MAX_QUOTE_ITEMS: usize = 50;

const NUMBER_ATTEMPTS: usize = 5;

/// One requested line on a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub description: String,
    pub quantity: i32,
}

/// A bulk or custom pricing request.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quote {
    pub id: QuoteId,
    pub quote_number: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub message: String,
    pub items: Json<Vec<QuoteItem>>,
    pub status: QuoteStatus,
    pub quoted_amount: Option<Decimal>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Total units requested across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }
}

/// A quote request from the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuote {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub message: String,
    #[serde(default)]
    pub items: Vec<QuoteItem>,
}

/// Normalized request fields shared by create and admin edit.
struct ValidQuote {
    name: String,
    email: Email,
    message: String,
    items: Vec<QuoteItem>,
}

fn validate_request(
    name: &str,
    email: &str,
    message: &str,
    items: &[QuoteItem],
) -> Result<ValidQuote, RepositoryError> {
    let name = required(name, "name")?;
    let email = Email::parse(email).map_err(|e| RepositoryError::invalid(e.to_string()))?;
    let message = required(message, "message")?;
    if items.len() > MAX_QUOTE_ITEMS {
        return Err(RepositoryError::invalid(format!(
            "a quote may list at most {MAX_QUOTE_ITEMS} items"
        )));
    }
    let items = items
        .iter()
        .map(|item| {
            let description = required(&item.description, "item description")?;
            if item.quantity < 1 {
                return Err(RepositoryError::invalid("item quantity must be at least 1"));
            }
            Ok(QuoteItem {
                product_id: item.product_id,
                description,
                quantity: item.quantity,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ValidQuote {
        name,
        email,
        message,
        items,
    })
}

impl NewQuote {
    fn validate(&self) -> Result<ValidQuote, RepositoryError> {
        validate_request(&self.name, &self.email, &self.message, &self.items)
    }
}

/// Back-office edit of a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub message: String,
    #[serde(default)]
    pub items: Vec<QuoteItem>,
    #[serde(default)]
    pub status: QuoteStatus,
    #[serde(default)]
    pub quoted_amount: Option<Decimal>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

impl QuoteInput {
    fn validate(&self) -> Result<ValidQuote, RepositoryError> {
        validate_quoted_amount(self.status, self.quoted_amount)?;
        validate_request(&self.name, &self.email, &self.message, &self.items)
    }
}

/// A `quoted` quote must carry a non-negative amount.
fn validate_quoted_amount(status: QuoteStatus, amount: Option<Decimal>) -> Result<(), RepositoryError> {
    if amount.is_some_and(|a| a < Decimal::ZERO) {
        return Err(RepositoryError::invalid("quoted amount cannot be negative"));
    }
    if status == QuoteStatus::Quoted && amount.is_none() {
        return Err(RepositoryError::invalid(
            "a quoted amount is required to mark a quote as quoted",
        ));
    }
    Ok(())
}

const LISTING: ListSpec = ListSpec {
    select: "*",
    from: "shop.quotes",
    search: &["quote_number", "name", "email", "company"],
    status: StatusColumn::Enum("status"),
    order_by: "created_at DESC, id DESC",
};

/// Repository for quote database operations.
pub struct QuoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuoteRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Quote>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query_as::<_, Quote>("SELECT * FROM shop.quotes WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, number: &str) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query_as::<_, Quote>("SELECT * FROM shop.quotes WHERE quote_number = $1")
            .bind(number.trim().to_uppercase())
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Quotes still waiting on staff.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_open(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.quotes WHERE status IN ('new', 'reviewing')",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Record a new quote request under a fresh quote number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input.
    pub async fn create(&self, request: &NewQuote) -> Result<Quote, RepositoryError> {
        let valid = request.validate()?;
        for _ in 0..NUMBER_ATTEMPTS {
            let number = numbers::generate(DocumentKind::Quote, Utc::now());
            let inserted = sqlx::query_as::<_, Quote>(
                "INSERT INTO shop.quotes \
                     (quote_number, name, email, company, phone, message, items) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (quote_number) DO NOTHING \
                 RETURNING *",
            )
            .bind(&number)
            .bind(&valid.name)
            .bind(valid.email.as_str())
            .bind(non_blank(request.company.as_deref()))
            .bind(non_blank(request.phone.as_deref()))
            .bind(&valid.message)
            .bind(Json(&valid.items))
            .fetch_optional(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
            if let Some(quote) = inserted {
                tracing::info!(quote_number = %quote.quote_number, "quote requested");
                return Ok(quote);
            }
        }
        Err(RepositoryError::Conflict(
            "could not allocate a quote number".to_owned(),
        ))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the quote does not exist.
    pub async fn update(&self, id: QuoteId, input: &QuoteInput) -> Result<Quote, RepositoryError> {
        let valid = input.validate()?;
        sqlx::query_as::<_, Quote>(
            "UPDATE shop.quotes \
             SET name = $2, email = $3, company = $4, phone = $5, message = $6, items = $7, \
                 status = $8, quoted_amount = $9, admin_notes = $10, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(&valid.name)
        .bind(valid.email.as_str())
        .bind(non_blank(input.company.as_deref()))
        .bind(non_blank(input.phone.as_deref()))
        .bind(&valid.message)
        .bind(Json(&valid.items))
        .bind(input.status)
        .bind(input.quoted_amount)
        .bind(non_blank(input.admin_notes.as_deref()))
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)
    }

    /// Change status, optionally setting the quoted amount and notes.
    ///
    /// Omitted amount and notes keep their stored values.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` when marking a quote `quoted`
    /// without an amount.
    pub async fn update_status(
        &self,
        id: QuoteId,
        status: QuoteStatus,
        quoted_amount: Option<Decimal>,
        admin_notes: Option<&str>,
    ) -> Result<Quote, RepositoryError> {
        let current = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        let amount = quoted_amount.or(current.quoted_amount);
        validate_quoted_amount(status, amount)?;
        let notes = non_blank(admin_notes).or(current.admin_notes);

        sqlx::query_as::<_, Quote>(
            "UPDATE shop.quotes \
             SET status = $2, quoted_amount = $3, admin_notes = $4, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(amount)
        .bind(notes)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the quote does not exist.
    pub async fn delete(&self, id: QuoteId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.quotes WHERE id = $1")
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

    fn request() -> NewQuote {
        NewQuote {
            name: "Grace Hopper".to_owned(),
            email: " Grace@Example.com ".to_owned(),
            company: Some("Navy".to_owned()),
            phone: None,
            message: "Pricing for 200 units?".to_owned(),
            items: vec![QuoteItem {
                product_id: Some(ProductId::new(4)),
                description: " Compiler manual ".to_owned(),
                quantity: 200,
            }],
        }
    }

    #[test]
    fn test_request_normalized() {
        let valid = request().validate().unwrap();
        assert_eq!(valid.email.as_str(), "grace@example.com");
        assert_eq!(valid.items[0].description, "Compiler manual");
    }

    #[test]
    fn test_request_rejects_bad_items() {
        let mut zero = request();
        zero.items[0].quantity = 0;
        assert!(zero.validate().is_err());

        let mut too_many = request();
        too_many.items = vec![too_many.items[0].clone(); MAX_QUOTE_ITEMS + 1];
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn test_quoted_requires_amount() {
        assert!(validate_quoted_amount(QuoteStatus::Quoted, None).is_err());
        assert!(validate_quoted_amount(QuoteStatus::Quoted, Some(Decimal::ONE_HUNDRED)).is_ok());
        assert!(validate_quoted_amount(QuoteStatus::Reviewing, None).is_ok());
        assert!(validate_quoted_amount(QuoteStatus::New, Some(Decimal::NEGATIVE_ONE)).is_err());
    }
}
