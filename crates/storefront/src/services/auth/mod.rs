//! Authentication service.
//!
//! Password registration and login. The session layer stores the resulting
//! [`CurrentUser`](crate::models::CurrentUser); this service never touches
//! the session itself.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use amyfairy_core::{Email, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{NewUser, User};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
pub struct AuthService<'a> {
    store: &'a dyn Store,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }

        let password_hash = hash_password(password)?;

        let user = self
            .store
            .create_user(&NewUser {
                email,
                name: name.to_owned(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .store
            .user_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);

        let user = auth
            .register("Amy@Example.com", "hunter2hunter2", "Amy")
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "amy@example.com");

        let again = auth.register("amy@example.com", "hunter2hunter2", "Amy").await;
        assert!(matches!(again, Err(AuthError::UserAlreadyExists)));

        let logged_in = auth.login("AMY@example.com", "hunter2hunter2").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            auth.login("amy@example.com", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "hunter2hunter2").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
