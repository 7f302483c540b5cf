//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use amyfairy_core::{Email, UserId, UserRole};

/// Session-stored user identity.
///
/// Passed explicitly into every service call that acts on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Role at login time.
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&super::user::User> for CurrentUser {
    fn from(user: &super::user::User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
