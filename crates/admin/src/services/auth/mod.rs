//! Back-office authentication service.
//!
//! Email + password sign-in with argon2 hashes stored on `shop.users`.
//! Only active `staff` and `admin` accounts may sign in.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use emporium_core::{Email, UserId};
use emporium_db::{NewUser, RepositoryError, User, UserInput, UserRepository};

/// Back-office authentication service.
pub struct AdminAuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AdminAuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email, a wrong
    /// password or an account without a password, and
    /// `AuthError::AccessDenied` for inactive or customer accounts.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .credentials_for(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_active || !user.role.can_access_admin() {
            return Err(AuthError::AccessDenied);
        }
        Ok(user)
    }

    /// Create an account, hashing the supplied password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` with a validation error for bad input
    /// or a conflict for a duplicate email.
    pub async fn create_user(&self, input: &UserInput) -> Result<User, AuthError> {
        let (email, name) = input.validate()?;
        let password_hash = input.password().map(hash_password).transpose()?;
        if password_hash.is_none() && input.role.can_access_admin() {
            return Err(AuthError::PasswordRequired);
        }
        if self.users.get_by_email(&email).await?.is_some() {
            return Err(RepositoryError::Conflict(format!("A user with email {email} already exists")).into());
        }

        let user = self
            .users
            .create(&NewUser {
                email,
                name,
                role: input.role,
                is_active: input.is_active,
                password_hash,
            })
            .await?;
        Ok(user)
    }

    /// Update an account. The password changes only when one is supplied.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` for bad input or an unknown user.
    pub async fn update_user(&self, id: UserId, input: &UserInput) -> Result<User, AuthError> {
        let (email, name) = input.validate()?;
        let new_hash = input.password().map(hash_password).transpose()?;

        let user = self
            .users
            .update(id, &email, &name, input.role, input.is_active)
            .await?;
        if let Some(hash) = new_hash {
            self.users.set_password(id, &hash).await?;
            return Ok(User {
                has_password: true,
                ..user
            });
        }
        Ok(user)
    }
}

/// Hash a password with argon2id and a random salt.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored PHC hash string.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the hash is malformed or the
/// password does not match.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_auth_error_maps_to_validation() {
        let err: emporium_db::RepositoryError = AuthError::PasswordRequired.into();
        assert!(matches!(err, emporium_db::RepositoryError::Validation(_)));
    }
}
