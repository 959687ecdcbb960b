//! Admin authentication error types.

use thiserror::Error;

use emporium_db::RepositoryError;

/// Errors that can occur during back-office authentication and account
/// management.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email, wrong password, or no password set.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The account exists but may not sign in to the back-office.
    #[error("account is disabled or has no back-office access")]
    AccessDenied,

    /// A password is required but none was given.
    #[error("a password is required")]
    PasswordRequired,

    /// Argon2 could not hash the password.
    #[error("failed to hash password")]
    PasswordHash,

    /// Repository/database error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<AuthError> for RepositoryError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Repository(inner) => inner,
            AuthError::PasswordHash => Self::DataCorruption(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}
