//! User repository.
//!
//! Users cover both customers and back-office staff. Password hashes never
//! leave this module except through [`UserRepository::credentials_for`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{Email, UserId, UserRole};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, required};

pub(crate) const fn default_true() -> bool {
    true
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    name: String,
    role: UserRole,
    is_active: bool,
    has_password: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            name: row.name,
            role: row.role,
            is_active: row.is_active,
            has_password: row.has_password,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COLUMNS: &str = "id, email, name, role, is_active, \
                       (password_hash IS NOT NULL) AS has_password, created_at, updated_at";

// =============================================================================
// Domain Types
// =============================================================================

/// A customer or back-office account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    /// Whether a password has been set (the hash itself is never exposed).
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Back-office create/update payload. `password` is plain text and must be
/// hashed by the caller before it reaches [`NewUser`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInput {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

/// A validated user ready to insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub password_hash: Option<String>,
}

/// Minimum password length accepted for back-office accounts.
pub const MIN_PASSWORD_LENGTH: usize = 10;

impl UserInput {
    /// Validate the input. The password is checked for length but not hashed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` describing the first problem.
    pub fn validate(&self) -> Result<(Email, String), RepositoryError> {
        let email =
            Email::parse(&self.email).map_err(|e| RepositoryError::invalid(e.to_string()))?;
        let name = required(&self.name, "name")?;
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty())
            && password.chars().count() < MIN_PASSWORD_LENGTH
        {
            return Err(RepositoryError::invalid(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok((email, name))
    }

    /// The password, if one was supplied.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

const LISTING: ListSpec = ListSpec {
    select: COLUMNS,
    from: "shop.users",
    search: &["email", "name"],
    status: StatusColumn::Enum("role"),
    order_by: "created_at DESC, id DESC",
};

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List users. `?status=` filters by role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored email is invalid.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<User>, RepositoryError> {
        let page: Paginated<UserRow> = fetch_page(self.pool, &LISTING, query).await?;
        let Paginated {
            items,
            page,
            per_page,
            total,
            total_pages,
        } = page;
        let items = items
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<User>, _>>()?;
        Ok(Paginated {
            items,
            page,
            per_page,
            total,
            total_pages,
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM shop.users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM shop.users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// The user and password hash for a login attempt.
    ///
    /// Returns `None` when the email is unknown or no password is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn credentials_for(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct CredentialRow {
            #[sqlx(flatten)]
            user: UserRow,
            password_hash: Option<String>,
        }

        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {COLUMNS}, password_hash FROM shop.users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(CredentialRow {
                user,
                password_hash: Some(hash),
            }) => Ok(Some((user.try_into()?, hash))),
            _ => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    pub async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO shop.users (email, name, role, is_active, password_hash) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        ))
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(user.role)
        .bind(user.is_active)
        .bind(&user.password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;
        row.try_into()
    }

    /// Update profile fields. The password is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update(
        &self,
        id: UserId,
        email: &Email,
        name: &str,
        role: UserRole,
        is_active: bool,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE shop.users \
             SET email = $2, name = $3, role = $4, is_active = $5, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(email.as_str())
        .bind(name)
        .bind(role)
        .bind(is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)?;
        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_active(&self, id: UserId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.users SET is_active = $2, updated_at = NOW() WHERE id = $1",
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
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.users WHERE id = $1")
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(password: Option<&str>) -> UserInput {
        UserInput {
            email: " Staff@Example.com ".to_owned(),
            name: "Sam".to_owned(),
            role: UserRole::Staff,
            is_active: true,
            password: password.map(str::to_owned),
        }
    }

    #[test]
    fn test_validate_normalizes_email() {
        let (email, name) = input(None).validate().unwrap();
        assert_eq!(email.as_str(), "staff@example.com");
        assert_eq!(name, "Sam");
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(input(Some("short")).validate().is_err());
        assert!(input(Some("long enough pw")).validate().is_ok());
        assert!(input(Some("")).validate().is_ok());
        assert_eq!(input(Some("")).password(), None);
    }

    #[test]
    fn test_password_never_serialized() {
        let json = serde_json::to_value(input(Some("secret-password"))).unwrap();
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_role_defaults_to_customer() {
        let parsed: UserInput =
            serde_json::from_str(r#"{"email": "a@b.co", "name": "A"}"#).unwrap();
        assert_eq!(parsed.role, UserRole::Customer);
        assert!(parsed.is_active);
    }
}
