//! Back-office user management.

use sqlx::PgPool;
use thiserror::Error;

use emporium_admin::services::{AdminAuthService, AuthError};
use emporium_core::UserRole;
use emporium_db::UserInput;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("A password is required for {0} accounts (pass --password or set EMPORIUM_PASSWORD)")]
    PasswordRequired(UserRole),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Build the account payload, checking a back-office role has a password.
///
/// # Errors
///
/// Returns `UserError::PasswordRequired` for a staff or admin account
/// without one.
pub fn user_input(
    email: String,
    name: String,
    role: UserRole,
    password: Option<String>,
) -> Result<UserInput, UserError> {
    let password = password.filter(|p| !p.is_empty());
    if password.is_none() && role.can_access_admin() {
        return Err(UserError::PasswordRequired(role));
    }
    Ok(UserInput {
        email,
        name,
        role,
        is_active: true,
        password,
    })
}

/// Create a user and log its ID.
///
/// # Errors
///
/// Returns `UserError::Auth` for invalid input, a duplicate email or a
/// database failure.
pub async fn create(
    pool: &PgPool,
    email: String,
    name: String,
    role: UserRole,
    password: Option<String>,
) -> Result<(), UserError> {
    let input = user_input(email, name, role, password)?;
    tracing::info!(email = %input.email, %role, "Creating user");

    let user = AdminAuthService::new(pool).create_user(&input).await?;
    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_back_office_roles_need_a_password() {
        let err = user_input("a@b.org".into(), "A".into(), UserRole::Admin, None).unwrap_err();
        assert!(matches!(err, UserError::PasswordRequired(UserRole::Admin)));

        let err = user_input("a@b.org".into(), "A".into(), UserRole::Staff, Some(String::new()))
            .unwrap_err();
        assert!(err.to_string().contains("EMPORIUM_PASSWORD"));
    }

    #[test]
    fn test_customers_may_skip_the_password() {
        let input = user_input("a@b.org".into(), "A".into(), UserRole::Customer, None).unwrap();
        assert!(input.password.is_none());
        assert!(input.is_active);
    }
}
