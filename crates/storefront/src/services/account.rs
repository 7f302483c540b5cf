//! Profile and address book.

use thiserror::Error;
use tracing::instrument;

use amyfairy_core::{AddressId, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{Address, NewAddress, ProfileUpdate, User};

/// Errors from account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Address not in the caller's address book.
    #[error("address not found")]
    AddressNotFound,

    /// Invalid input.
    #[error("{0}")]
    Invalid(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Account service.
pub struct AccountService<'a> {
    store: &'a dyn Store,
}

impl<'a> AccountService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The caller's profile.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the account no longer exists.
    pub async fn profile(&self, user_id: UserId) -> Result<User, AccountError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AccountError::UserNotFound)
    }

    /// Update name and/or phone.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a blank name.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, AccountError> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AccountError::Invalid("name cannot be empty".to_owned()));
        }
        self.store
            .update_profile(user_id, update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AccountError::UserNotFound,
                other => AccountError::Repository(other),
            })
    }

    /// The caller's saved addresses.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Repository` if the query fails.
    pub async fn addresses(&self, user_id: UserId) -> Result<Vec<Address>, AccountError> {
        Ok(self.store.addresses(user_id).await?)
    }

    /// One saved address.
    ///
    /// # Errors
    ///
    /// Returns `AddressNotFound` if it is not in the caller's book.
    pub async fn address(&self, user_id: UserId, id: AddressId) -> Result<Address, AccountError> {
        self.store
            .address(user_id, id)
            .await?
            .ok_or(AccountError::AddressNotFound)
    }

    /// Save an address.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` if a field is blank.
    #[instrument(skip(self, address))]
    pub async fn add_address(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Address, AccountError> {
        address.validate().map_err(AccountError::Invalid)?;
        Ok(self.store.add_address(user_id, address).await?)
    }

    /// Delete a saved address. Orders keep their own copy.
    ///
    /// # Errors
    ///
    /// Returns `AddressNotFound` if it is not in the caller's book.
    #[instrument(skip(self))]
    pub async fn delete_address(&self, user_id: UserId, id: AddressId) -> Result<(), AccountError> {
        if self.store.delete_address(user_id, id).await? {
            Ok(())
        } else {
            Err(AccountError::AddressNotFound)
        }
    }
}
