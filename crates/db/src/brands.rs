//! Brand repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{BrandId, Slug};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, non_blank, required};

/// A product brand.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub website: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a brand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default = "crate::users::default_true")]
    pub is_active: bool,
}

struct ValidBrand {
    name: String,
    slug: Slug,
    description: Option<String>,
    logo_url: Option<String>,
    website: Option<String>,
    is_active: bool,
}

/// Reject anything that is not an absolute http(s) URL.
pub(crate) fn optional_url(value: Option<&str>, field: &str) -> Result<Option<String>, RepositoryError> {
    match non_blank(value) {
        Some(url) if url.starts_with("https://") || url.starts_with("http://") => Ok(Some(url)),
        Some(_) => Err(RepositoryError::invalid(format!(
            "{field} must start with http:// or https://"
        ))),
        None => Ok(None),
    }
}

impl BrandInput {
    fn validate(&self) -> Result<ValidBrand, RepositoryError> {
        let name = required(&self.name, "name")?;
        let slug = Slug::explicit_or_from(self.slug.as_deref(), &name)
            .map_err(|e| RepositoryError::invalid(e.to_string()))?;
        Ok(ValidBrand {
            slug,
            description: non_blank(self.description.as_deref()),
            logo_url: optional_url(self.logo_url.as_deref(), "logo URL")?,
            website: optional_url(self.website.as_deref(), "website")?,
            is_active: self.is_active,
            name,
        })
    }
}

const LISTING: ListSpec = ListSpec {
    select: "*",
    from: "shop.brands",
    search: &["name", "slug"],
    status: StatusColumn::Active("is_active"),
    order_by: "name ASC, id ASC",
};

/// Repository for brand database operations.
pub struct BrandRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BrandRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List brands for the back-office.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Brand>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// Active brands ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Brand>, RepositoryError> {
        let rows = sqlx::query_as::<_, Brand>(
            "SELECT * FROM shop.brands WHERE is_active ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BrandId) -> Result<Option<Brand>, RepositoryError> {
        let row = sqlx::query_as::<_, Brand>("SELECT * FROM shop.brands WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Brand>, RepositoryError> {
        let row = sqlx::query_as::<_, Brand>("SELECT * FROM shop.brands WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create a brand, deriving the slug from the name when none is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input and
    /// `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &BrandInput) -> Result<Brand, RepositoryError> {
        let brand = input.validate()?;
        sqlx::query_as::<_, Brand>(
            "INSERT INTO shop.brands (name, slug, description, logo_url, website, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING *",
        )
        .bind(&brand.name)
        .bind(brand.slug.as_str())
        .bind(&brand.description)
        .bind(&brand.logo_url)
        .bind(&brand.website)
        .bind(brand.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the brand does not exist.
    pub async fn update(&self, id: BrandId, input: &BrandInput) -> Result<Brand, RepositoryError> {
        let brand = input.validate()?;
        sqlx::query_as::<_, Brand>(
            "UPDATE shop.brands \
             SET name = $2, slug = $3, description = $4, logo_url = $5, website = $6, \
                 is_active = $7, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(&brand.name)
        .bind(brand.slug.as_str())
        .bind(&brand.description)
        .bind(&brand.logo_url)
        .bind(&brand.website)
        .bind(brand.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the brand does not exist.
    pub async fn set_active(&self, id: BrandId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.brands SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(is_active)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a brand. Its products keep existing without a brand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the brand does not exist.
    pub async fn delete(&self, id: BrandId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.brands WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Insert or update a brand keyed by slug. Used by the seeder.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input.
    pub async fn upsert(&self, input: &BrandInput) -> Result<Brand, RepositoryError> {
        let brand = input.validate()?;
        sqlx::query_as::<_, Brand>(
            "INSERT INTO shop.brands (name, slug, description, logo_url, website, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 description = EXCLUDED.description, \
                 logo_url = EXCLUDED.logo_url, \
                 website = EXCLUDED.website, \
                 is_active = EXCLUDED.is_active, \
                 updated_at = NOW() \
             RETURNING *",
        )
        .bind(&brand.name)
        .bind(brand.slug.as_str())
        .bind(&brand.description)
        .bind(&brand.logo_url)
        .bind(&brand.website)
        .bind(brand.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_derived_from_name() {
        let input = BrandInput {
            name: " Acme Tools ".to_owned(),
            ..BrandInput::default()
        };
        let brand = input.validate().unwrap();
        assert_eq!(brand.name, "Acme Tools");
        assert_eq!(brand.slug.as_str(), "acme-tools");
    }

    #[test]
    fn test_rejects_bad_urls() {
        let input = BrandInput {
            name: "Acme".to_owned(),
            website: Some("acme.example".to_owned()),
            ..BrandInput::default()
        };
        assert!(matches!(
            input.validate(),
            Err(RepositoryError::Validation(msg)) if msg.contains("website")
        ));
    }

    #[test]
    fn test_blank_optional_fields_become_none() {
        let input = BrandInput {
            name: "Acme".to_owned(),
            description: Some("  ".to_owned()),
            logo_url: Some(String::new()),
            ..BrandInput::default()
        };
        let brand = input.validate().unwrap();
        assert!(brand.description.is_none());
        assert!(brand.logo_url.is_none());
    }

    #[test]
    fn test_is_active_defaults_true_when_missing() {
        let input: BrandInput = serde_json::from_str(r#"{"name": "Acme"}"#).unwrap();
        assert!(input.is_active);
    }
}
