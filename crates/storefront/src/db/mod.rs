//! Storage layer.
//!
//! Services talk to storage through the object-safe [`Store`] trait so the
//! same code runs against `PostgreSQL` in production and against
//! [`MemoryStore`] in tests and embedders.
//!
//! # Database
//!
//! ## Tables
//!
//! - `users` - accounts (email, Argon2 hash, role)
//! - `addresses` - user address books
//! - `products` - catalog, soft-deleted only
//! - `cart_items` - unique per `(user_id, product_id, color, size)`
//! - `orders` - frozen items and shipping address as JSONB
//! - `payment_intents` - gateway transactions, unique `transaction_id`
//! - `tower_sessions.session` - session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p amyfairy-cli -- migrate
//! ```
//!
//! # Concurrency
//!
//! Only `products.stock`, `orders.status`, `orders.payment_confirmed` and
//! `payment_intents.status` change after creation, and every one of those
//! updates is conditional on the previous value.

mod cart;
mod memory;
mod orders;
mod payments;
mod products;
mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use amyfairy_core::{
    AddressId, CartItemId, Email, OrderId, OrderStatus, ProductId, UserId, UserRole,
};

pub use memory::MemoryStore;

use crate::models::{
    Address, CartItem, CartLine, NewAddress, NewCartItem, NewOrder, NewPaymentIntent, NewUser,
    Order, OrderQuery, Page, PaymentIntent, PaymentOutcome, Product, ProductDraft, ProductPatch,
    ProductQuery, ProfileUpdate, Settlement, StockShortfall, User,
};

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A conditional stock decrement failed; nothing was committed.
    #[error("insufficient stock for {} product(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    /// Cart items in an order snapshot were already consumed or removed.
    #[error("cart changed while the order was being placed")]
    CartChanged,
}

impl RepositoryError {
    /// Map unique violations to [`RepositoryError::Conflict`].
    pub(crate) fn from_unique(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(what.to_owned());
        }
        Self::Database(e)
    }
}

/// Catalog storage.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Get a product by id, including soft-deleted ones.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Filtered, sorted, paginated listing.
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError>;

    /// Distinct brands of non-deleted products, sorted.
    async fn brands(&self) -> Result<Vec<String>, RepositoryError>;

    /// Distinct categories of non-deleted products, sorted.
    async fn categories(&self) -> Result<Vec<String>, RepositoryError>;

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, RepositoryError>;

    /// Returns [`RepositoryError::NotFound`] for unknown ids.
    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError>;

    /// Set the deleted flag. Returns `false` for unknown ids.
    async fn soft_delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;
}

/// Cart storage. Every operation is scoped to the owning user.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Cart items joined with current product data, oldest first.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Returns [`RepositoryError::Conflict`] if the exact variant is already in
    /// the cart.
    async fn insert_cart_item(&self, item: &NewCartItem) -> Result<CartItem, RepositoryError>;

    /// One cart line, if it belongs to `user_id`.
    async fn cart_line(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Returns `None` if the item does not belong to `user_id`.
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, RepositoryError>;

    /// Returns `false` if nothing was deleted.
    async fn delete_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<bool, RepositoryError>;
}

/// Order storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Atomically decrement stock, insert the order and consume the cart items.
    ///
    /// Returns [`RepositoryError::InsufficientStock`] if any decrement would go
    /// negative, and [`RepositoryError::CartChanged`] if any of
    /// `order.cart_item_ids` is no longer in the user's cart. Nothing is
    /// written on error.
    async fn commit_order(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// A user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError>;

    /// Compare-and-swap the status. Returns `None` when the order is no longer
    /// in `from`.
    async fn transition_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Payment intent storage.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Returns [`RepositoryError::Conflict`] on a duplicate transaction id.
    async fn insert_payment_intent(
        &self,
        intent: &NewPaymentIntent,
    ) -> Result<PaymentIntent, RepositoryError>;

    /// The order's intent still in `created`, if any.
    async fn open_payment_intent(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentIntent>, RepositoryError>;

    async fn payment_intent_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentIntent>, RepositoryError>;

    /// Move an intent out of `created` exactly once.
    ///
    /// A confirmed outcome also marks the order paid in the same unit of work.
    /// Returns [`RepositoryError::NotFound`] for unknown transactions.
    async fn settle_payment_intent(
        &self,
        transaction_id: &str,
        outcome: &PaymentOutcome,
    ) -> Result<Settlement, RepositoryError>;
}

/// Account and address book storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns [`RepositoryError::Conflict`] if the email is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// The user and their password hash.
    async fn user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError>;

    async fn set_user_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError>;

    async fn addresses(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError>;

    async fn address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError>;

    async fn add_address(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Address, RepositoryError>;

    async fn delete_address(&self, user_id: UserId, id: AddressId)
    -> Result<bool, RepositoryError>;
}

/// Everything the storefront persists.
#[async_trait]
pub trait Store:
    ProductRepository + CartRepository + OrderRepository + PaymentRepository + UserRepository
{
    /// Readiness probe.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
