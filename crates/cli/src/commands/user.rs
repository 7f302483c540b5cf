//! User management commands.
//!
//! ```bash
//! amy-cli user promote --email shopper@example.com
//! ```
//!
//! Roles are read into the session at login, so a promoted user must log in
//! again to pick up administrator access.

use amyfairy_core::{Email, UserRole};
use amyfairy_storefront::db::{PgStore, RepositoryError, UserRepository};

use super::{CommandError, connect};

/// Grant the administrator role to an existing account.
pub async fn promote(email: &str) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::Invalid(e.to_string()))?;
    let store = PgStore::new(connect().await?);

    let user = store
        .set_user_role(&email, UserRole::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                CommandError::Invalid(format!("no user with email {email}"))
            }
            other => other.into(),
        })?;

    tracing::info!(id = %user.id, email = %user.email, role = %user.role, "User promoted");
    Ok(())
}
