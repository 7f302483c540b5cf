//! Cart queries for [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use amyfairy_core::{CartItemId, ProductId, UserId};

use super::products::{ProductRow, product_columns};
use super::{CartRepository, PgStore, RepositoryError};
use crate::models::{CartItem, CartLine, NewCartItem, Product};

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
    color: Option<String>,
    size: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            quantity: row.quantity,
            color: row.color,
            size: row.size,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A cart item joined with its product. Item columns carry an `item_` prefix.
#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    item_id: CartItemId,
    item_user_id: UserId,
    item_quantity: i32,
    item_color: Option<String>,
    item_size: Option<String>,
    item_created_at: DateTime<Utc>,
    item_updated_at: DateTime<Utc>,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        let product = Product::from(row.product);
        let item = CartItem {
            id: row.item_id,
            user_id: row.item_user_id,
            product_id: product.id,
            quantity: row.item_quantity,
            color: row.item_color,
            size: row.item_size,
            created_at: row.item_created_at,
            updated_at: row.item_updated_at,
        };
        Self::new(&item, &product)
    }
}

macro_rules! cart_line_select {
    () => {
        concat!(
            "SELECT ci.id AS item_id, ci.user_id AS item_user_id, ci.quantity AS item_quantity, \
             ci.color AS item_color, ci.size AS item_size, ci.created_at AS item_created_at, \
             ci.updated_at AS item_updated_at, ",
            product_columns!(),
            " FROM cart_items ci JOIN products p ON p.id = ci.product_id"
        )
    };
}

const CART_ITEM_COLUMNS: &str =
    "id, user_id, product_id, quantity, color, size, created_at, updated_at";

#[async_trait]
impl CartRepository for PgStore {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(concat!(
            cart_line_select!(),
            " WHERE ci.user_id = $1 ORDER BY ci.created_at, ci.id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    async fn insert_cart_item(&self, item: &NewCartItem) -> Result<CartItem, RepositoryError> {
        let sql = format!(
            "INSERT INTO cart_items (user_id, product_id, quantity, color, size) \
             VALUES ($1, $2, 1, $3, $4) RETURNING {CART_ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CartItemRow>(&sql)
            .bind(item.user_id)
            .bind(item.product_id)
            .bind(&item.color)
            .bind(&item.size)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "item already in cart"))?;

        Ok(row.into())
    }

    async fn cart_line(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(concat!(
            cart_line_select!(),
            " WHERE ci.user_id = $1 AND ci.id = $2"
        ))
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CartLine::from))
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let sql = format!(
            "UPDATE cart_items SET quantity = $3, updated_at = now() \
             WHERE user_id = $1 AND id = $2 RETURNING {CART_ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CartItemRow>(&sql)
            .bind(user_id)
            .bind(item_id)
            .bind(quantity)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(CartItem::from))
    }

    async fn delete_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
