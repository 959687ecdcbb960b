//! Category repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{CategoryId, Slug};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, non_blank, required};

/// A product category. Categories nest one level through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "crate::users::default_true")]
    pub is_active: bool,
}

struct ValidCategory {
    name: String,
    slug: Slug,
    description: Option<String>,
    parent_id: Option<CategoryId>,
    sort_order: i32,
    is_active: bool,
}

impl CategoryInput {
    fn validate(&self, id: Option<CategoryId>) -> Result<ValidCategory, RepositoryError> {
        let name = required(&self.name, "name")?;
        let slug = Slug::explicit_or_from(self.slug.as_deref(), &name)
            .map_err(|e| RepositoryError::invalid(e.to_string()))?;
        if id.is_some() && self.parent_id == id {
            return Err(RepositoryError::invalid(
                "a category cannot be its own parent",
            ));
        }
        Ok(ValidCategory {
            name,
            slug,
            description: non_blank(self.description.as_deref()),
            parent_id: self.parent_id,
            sort_order: self.sort_order,
            is_active: self.is_active,
        })
    }
}

const LISTING: ListSpec = ListSpec {
    select: "*",
    from: "shop.categories",
    search: &["name", "slug"],
    status: StatusColumn::Active("is_active"),
    order_by: "sort_order ASC, name ASC",
};

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Category>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// Active categories in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT * FROM shop.categories WHERE is_active ORDER BY sort_order, name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, Category>("SELECT * FROM shop.categories WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, Category>("SELECT * FROM shop.categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input and
    /// `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let category = input.validate(None)?;
        sqlx::query_as::<_, Category>(
            "INSERT INTO shop.categories (name, slug, description, parent_id, sort_order, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING *",
        )
        .bind(&category.name)
        .bind(category.slug.as_str())
        .bind(&category.description)
        .bind(category.parent_id)
        .bind(category.sort_order)
        .bind(category.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` when the category would become
    /// its own parent, `RepositoryError::NotFound` if it does not exist.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let category = input.validate(Some(id))?;
        sqlx::query_as::<_, Category>(
            "UPDATE shop.categories \
             SET name = $2, slug = $3, description = $4, parent_id = $5, sort_order = $6, \
                 is_active = $7, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(&category.name)
        .bind(category.slug.as_str())
        .bind(&category.description)
        .bind(category.parent_id)
        .bind(category.sort_order)
        .bind(category.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn set_active(&self, id: CategoryId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.categories SET is_active = $2, updated_at = NOW() WHERE id = $1",
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

    /// Delete a category. Children and products are detached, not deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Insert or update a category keyed by slug. Used by the seeder.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input.
    pub async fn upsert(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let category = input.validate(None)?;
        sqlx::query_as::<_, Category>(
            "INSERT INTO shop.categories (name, slug, description, parent_id, sort_order, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 description = EXCLUDED.description, \
                 parent_id = EXCLUDED.parent_id, \
                 sort_order = EXCLUDED.sort_order, \
                 is_active = EXCLUDED.is_active, \
                 updated_at = NOW() \
             RETURNING *",
        )
        .bind(&category.name)
        .bind(category.slug.as_str())
        .bind(&category.description)
        .bind(category.parent_id)
        .bind(category.sort_order)
        .bind(category.is_active)
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
    fn test_parent_cannot_be_self() {
        let input = CategoryInput {
            name: "Shoes".to_owned(),
            parent_id: Some(CategoryId::new(4)),
            ..CategoryInput::default()
        };
        assert!(input.validate(Some(CategoryId::new(4))).is_err());
        assert!(input.validate(Some(CategoryId::new(5))).is_ok());
        assert!(input.validate(None).is_ok());
    }

    #[test]
    fn test_explicit_slug_must_be_clean() {
        let input = CategoryInput {
            name: "Shoes".to_owned(),
            slug: Some("Bad Slug".to_owned()),
            ..CategoryInput::default()
        };
        assert!(matches!(
            input.validate(None),
            Err(RepositoryError::Validation(_))
        ));
    }
}
