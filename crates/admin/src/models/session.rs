//! Session-related types for admin authentication.

use serde::{Deserialize, Serialize};

use emporium_core::{Email, UserId, UserRole};
use emporium_db::User;

/// Session-stored identity of the signed-in back-office user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Staff are read-only; admins may write.
    pub role: UserRole,
}

impl CurrentAdmin {
    /// Whether this user may create, update or delete records.
    #[must_use]
    pub const fn can_write(&self) -> bool {
        self.role.can_write()
    }
}

impl From<&User> for CurrentAdmin {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// Key for the one-shot flash message shown after a redirect.
    pub const FLASH: &str = "admin_flash";
}
