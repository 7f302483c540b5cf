//! User and address types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use amyfairy_core::{AddressId, Email, UserId, UserRole};

use super::order::ShippingAddress;

/// A storefront account. The password hash never leaves the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: String,
    pub password_hash: String,
}

/// Profile fields a user may change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// A saved address in a user's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub pin_code: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for an address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAddress {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub pin_code: String,
}

impl NewAddress {
    /// Every field is required.
    ///
    /// # Errors
    ///
    /// Returns the name of the first blank field.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("pin_code", &self.pin_code),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        Ok(())
    }
}

impl From<&Address> for ShippingAddress {
    fn from(address: &Address) -> Self {
        Self {
            name: address.name.clone(),
            email: address.email.clone(),
            phone: address.phone.clone(),
            street: address.street.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            pin_code: address.pin_code.clone(),
        }
    }
}
