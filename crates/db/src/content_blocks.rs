//! Content block repository (banners, hero sections, footer text).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{ContentBlockId, ContentBlockType, Placement, Slug};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, required};

/// A piece of merchandising content placed on a storefront page.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentBlock {
    pub id: ContentBlockId,
    pub key: String,
    pub title: String,
    pub body: String,
    pub block_type: ContentBlockType,
    pub placement: Placement,
    pub position: i32,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentBlock {
    /// Whether the block should be shown at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.is_none_or(|starts| starts <= now)
            && self.ends_at.is_none_or(|ends| now < ends)
    }
}

/// Create/update payload for a content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlockInput {
    /// Stable identifier; derived from the title when blank.
    #[serde(default)]
    pub key: Option<String>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub block_type: ContentBlockType,
    pub placement: Placement,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "crate::users::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl ContentBlockInput {
    fn validate(&self) -> Result<(String, Slug), RepositoryError> {
        let title = required(&self.title, "title")?;
        let key = Slug::explicit_or_from(self.key.as_deref(), &title)
            .map_err(|e| RepositoryError::invalid(format!("key: {e}")))?;
        if let (Some(starts), Some(ends)) = (self.starts_at, self.ends_at)
            && ends <= starts
        {
            return Err(RepositoryError::invalid("end must be after start"));
        }
        Ok((title, key))
    }
}

const LISTING: ListSpec = ListSpec {
    select: "*",
    from: "shop.content_blocks",
    search: &["key", "title", "body"],
    status: StatusColumn::Active("is_active"),
    order_by: "placement ASC, position ASC, id ASC",
};

/// Repository for content block database operations.
pub struct ContentBlockRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContentBlockRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<ContentBlock>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// Blocks to render in `placement` at `now`, in position order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_for_placement(
        &self,
        placement: Placement,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContentBlock>, RepositoryError> {
        let rows = sqlx::query_as::<_, ContentBlock>(
            "SELECT * FROM shop.content_blocks \
             WHERE placement = $1 AND is_active \
               AND (starts_at IS NULL OR starts_at <= $2) \
               AND (ends_at IS NULL OR ends_at > $2) \
             ORDER BY position, id",
        )
        .bind(placement)
        .bind(now)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ContentBlockId) -> Result<Option<ContentBlock>, RepositoryError> {
        let row = sqlx::query_as::<_, ContentBlock>("SELECT * FROM shop.content_blocks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the key is taken.
    pub async fn create(&self, input: &ContentBlockInput) -> Result<ContentBlock, RepositoryError> {
        let (title, key) = input.validate()?;
        sqlx::query_as::<_, ContentBlock>(
            "INSERT INTO shop.content_blocks \
                 (key, title, body, block_type, placement, position, is_active, starts_at, ends_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING *",
        )
        .bind(key.as_str())
        .bind(&title)
        .bind(&input.body)
        .bind(input.block_type)
        .bind(input.placement)
        .bind(input.position)
        .bind(input.is_active)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the block does not exist.
    pub async fn update(
        &self,
        id: ContentBlockId,
        input: &ContentBlockInput,
    ) -> Result<ContentBlock, RepositoryError> {
        let (title, key) = input.validate()?;
        sqlx::query_as::<_, ContentBlock>(
            "UPDATE shop.content_blocks \
             SET key = $2, title = $3, body = $4, block_type = $5, placement = $6, \
                 position = $7, is_active = $8, starts_at = $9, ends_at = $10, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(key.as_str())
        .bind(&title)
        .bind(&input.body)
        .bind(input.block_type)
        .bind(input.placement)
        .bind(input.position)
        .bind(input.is_active)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the block does not exist.
    pub async fn set_active(&self, id: ContentBlockId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.content_blocks SET is_active = $2, updated_at = NOW() WHERE id = $1",
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

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the block does not exist.
    pub async fn delete(&self, id: ContentBlockId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.content_blocks WHERE id = $1")
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
    use chrono::{Duration, TimeZone};

    use super::*;

    fn input() -> ContentBlockInput {
        ContentBlockInput {
            key: None,
            title: "Summer Sale".to_owned(),
            body: "Up to 40% off".to_owned(),
            block_type: ContentBlockType::Banner,
            placement: Placement::Home,
            position: 0,
            is_active: true,
            starts_at: None,
            ends_at: None,
        }
    }

    #[test]
    fn test_key_derived_from_title() {
        let (_, key) = input().validate().unwrap();
        assert_eq!(key.as_str(), "summer-sale");
    }

    #[test]
    fn test_window_must_be_ordered() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut block = input();
        block.starts_at = Some(now);
        block.ends_at = Some(now);
        assert!(block.validate().is_err());
        block.ends_at = Some(now + Duration::days(1));
        assert!(block.validate().is_ok());
    }

    #[test]
    fn test_is_live() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let block = ContentBlock {
            id: ContentBlockId::new(1),
            key: "k".to_owned(),
            title: "t".to_owned(),
            body: String::new(),
            block_type: ContentBlockType::Text,
            placement: Placement::Footer,
            position: 0,
            is_active: true,
            starts_at: Some(now - Duration::hours(1)),
            ends_at: Some(now + Duration::hours(1)),
            created_at: now,
            updated_at: now,
        };
        assert!(block.is_live(now));
        assert!(!block.is_live(now + Duration::hours(1)));
        assert!(!ContentBlock {
            is_active: false,
            ..block
        }
        .is_live(now));
    }
}
