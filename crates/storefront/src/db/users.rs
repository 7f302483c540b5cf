//! Account and address book queries for [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use amyfairy_core::{AddressId, Email, UserId, UserRole};

use super::{PgStore, RepositoryError, UserRepository};
use crate::models::{Address, NewAddress, NewUser, ProfileUpdate, User};

macro_rules! user_columns {
    () => {
        "id, email, name, phone, role, created_at, updated_at"
    };
}

macro_rules! address_columns {
    () => {
        "id, user_id, name, email, phone, street, city, state, pin_code, created_at"
    };
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: String,
    phone: Option<String>,
    role: UserRole,
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
            id: row.id,
            email,
            name: row.name,
            phone: row.phone,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    name: String,
    email: String,
    phone: String,
    street: String,
    city: String,
    state: String,
    pin_code: String,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            street: row.street,
            city: row.city,
            state: row.state,
            pin_code: row.pin_code,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) RETURNING ",
            user_columns!()
        ))
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email already exists"))?;

        row.try_into()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(concat!(
            "SELECT ",
            user_columns!(),
            ", password_hash FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE users SET name = COALESCE($2, name), phone = COALESCE($3, phone), \
             updated_at = now() WHERE id = $1 RETURNING ",
            user_columns!()
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.phone)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn set_user_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE users SET role = $2, updated_at = now() WHERE email = $1 RETURNING ",
            user_columns!()
        ))
        .bind(email.as_str())
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn addresses(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(concat!(
            "SELECT ",
            address_columns!(),
            " FROM addresses WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(concat!(
            "SELECT ",
            address_columns!(),
            " FROM addresses WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    async fn add_address(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Address, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(concat!(
            "INSERT INTO addresses (user_id, name, email, phone, street, city, state, pin_code) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING ",
            address_columns!()
        ))
        .bind(user_id)
        .bind(&address.name)
        .bind(&address.email)
        .bind(&address.phone)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.pin_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn delete_address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
