//! Cart manager.
//!
//! The cart is optimistic: adding or resizing an item never reserves stock.
//! Quantities are validated against the stock visible at the time of the
//! call, and the final word belongs to order placement.

use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use amyfairy_core::{CartItemId, ProductId, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{CartItem, CartLine, CartView, NewCartItem};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Product does not exist or was removed from the catalog.
    #[error("product not found")]
    ProductNotFound,

    /// Product has no stock left.
    #[error("{0} is out of stock")]
    OutOfStock(String),

    /// Color/size selection does not match the product.
    #[error("invalid variant: {0}")]
    InvalidVariant(String),

    /// The same product variant is already in the cart.
    #[error("this item is already in your cart")]
    DuplicateItem,

    /// No such item in the caller's cart.
    #[error("cart item not found")]
    ItemNotFound,

    /// Quantity below one or above current stock.
    #[error("{0}")]
    InvalidQuantity(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Request to add a product variant to the cart.
#[derive(Debug, Clone, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

/// Blank selections mean "no selection".
fn normalize(choice: Option<&str>) -> Option<String> {
    choice
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Cart service.
pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Add a product variant with quantity 1.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound`, `OutOfStock`, `InvalidVariant` or
    /// `DuplicateItem`.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        request: &AddToCart,
    ) -> Result<CartItem, CartError> {
        let product = self
            .store
            .get_product(request.product_id)
            .await?
            .filter(|p| !p.deleted)
            .ok_or(CartError::ProductNotFound)?;

        if product.stock < 1 {
            return Err(CartError::OutOfStock(product.title));
        }

        let color = normalize(request.color.as_deref());
        let size = normalize(request.size.as_deref());
        product
            .check_variant(color.as_deref(), size.as_deref())
            .map_err(CartError::InvalidVariant)?;

        let item = NewCartItem {
            user_id,
            product_id: product.id,
            color,
            size,
        };

        self.store
            .insert_cart_item(&item)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => CartError::DuplicateItem,
                RepositoryError::NotFound => CartError::ProductNotFound,
                other => CartError::Repository(other),
            })
    }

    /// Set the quantity of a cart item.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` if the item is not in the caller's cart and
    /// `InvalidQuantity` if `quantity` is below 1 or above current stock.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartLine, CartError> {
        let line = self
            .store
            .cart_line(user_id, item_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;

        if quantity < 1 {
            return Err(CartError::InvalidQuantity(
                "quantity must be at least 1".to_owned(),
            ));
        }
        if line.deleted {
            return Err(CartError::InvalidQuantity(format!(
                "{} is no longer available",
                line.title
            )));
        }
        if quantity > line.stock {
            return Err(CartError::InvalidQuantity(format!(
                "only {} left in stock",
                line.stock
            )));
        }

        self.store
            .set_cart_quantity(user_id, item_id, quantity)
            .await?
            .ok_or(CartError::ItemNotFound)?;

        self.store
            .cart_line(user_id, item_id)
            .await?
            .ok_or(CartError::ItemNotFound)
    }

    /// Remove a cart item. Removing a missing item succeeds.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: UserId, item_id: CartItemId) -> Result<(), CartError> {
        if !self.store.delete_cart_item(user_id, item_id).await? {
            tracing::debug!("cart item already gone");
        }
        Ok(())
    }

    /// The caller's cart joined with live product data.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn list_items(&self, user_id: UserId) -> Result<CartView, CartError> {
        let lines = self.store.cart_lines(user_id).await?;
        Ok(CartView::from_lines(lines))
    }
}
