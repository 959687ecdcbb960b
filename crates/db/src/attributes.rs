//! Product attribute definitions (size, material, voltage, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{AttributeId, AttributeKind, Slug};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, required};

/// An attribute products may carry a value for.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
    pub slug: String,
    pub kind: AttributeKind,
    pub options: Vec<String>,
    pub is_filterable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for an attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub kind: AttributeKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub is_filterable: bool,
}

struct ValidAttribute {
    name: String,
    slug: Slug,
    kind: AttributeKind,
    options: Vec<String>,
    is_filterable: bool,
}

impl AttributeInput {
    fn validate(&self) -> Result<ValidAttribute, RepositoryError> {
        let name = required(&self.name, "name")?;
        let slug = Slug::explicit_or_from(self.slug.as_deref(), &name)
            .map_err(|e| RepositoryError::invalid(e.to_string()))?;

        let mut options: Vec<String> = Vec::with_capacity(self.options.len());
        for option in self.options.iter().map(|o| o.trim()).filter(|o| !o.is_empty()) {
            if !options.iter().any(|existing| existing.eq_ignore_ascii_case(option)) {
                options.push(option.to_owned());
            }
        }

        match self.kind {
            AttributeKind::Select if options.is_empty() => {
                return Err(RepositoryError::invalid(
                    "select attributes need at least one option",
                ));
            }
            AttributeKind::Select => {}
            _ => options.clear(),
        }

        Ok(ValidAttribute {
            name,
            slug,
            kind: self.kind,
            options,
            is_filterable: self.is_filterable,
        })
    }
}

const LISTING: ListSpec = ListSpec {
    select: "*",
    from: "shop.attributes",
    search: &["name", "slug"],
    status: StatusColumn::Enum("kind"),
    order_by: "name ASC",
};

/// Repository for attribute database operations.
pub struct AttributeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AttributeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List attributes. `?status=` filters by kind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Attribute>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AttributeId) -> Result<Option<Attribute>, RepositoryError> {
        let row = sqlx::query_as::<_, Attribute>("SELECT * FROM shop.attributes WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input and
    /// `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &AttributeInput) -> Result<Attribute, RepositoryError> {
        let attribute = input.validate()?;
        sqlx::query_as::<_, Attribute>(
            "INSERT INTO shop.attributes (name, slug, kind, options, is_filterable) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING *",
        )
        .bind(&attribute.name)
        .bind(attribute.slug.as_str())
        .bind(attribute.kind)
        .bind(&attribute.options)
        .bind(attribute.is_filterable)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attribute does not exist.
    pub async fn update(
        &self,
        id: AttributeId,
        input: &AttributeInput,
    ) -> Result<Attribute, RepositoryError> {
        let attribute = input.validate()?;
        sqlx::query_as::<_, Attribute>(
            "UPDATE shop.attributes \
             SET name = $2, slug = $3, kind = $4, options = $5, is_filterable = $6, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(&attribute.name)
        .bind(attribute.slug.as_str())
        .bind(attribute.kind)
        .bind(&attribute.options)
        .bind(attribute.is_filterable)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attribute does not exist.
    pub async fn delete(&self, id: AttributeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.attributes WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
