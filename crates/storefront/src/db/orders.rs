//! Order queries for [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use amyfairy_core::{OrderId, OrderStatus, PaymentMethod, UserId};

use super::{OrderRepository, PgStore, RepositoryError};
use crate::models::page::offset;
use crate::models::{
    NewOrder, Order, OrderItem, OrderQuery, OrderSort, Page, ShippingAddress, StockShortfall,
};

macro_rules! order_columns {
    () => {
        "id, user_id, items, total_amount, total_items, shipping_address, payment_method, \
         status, payment_confirmed, paid_at, created_at, updated_at"
    };
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    items: Json<Vec<OrderItem>>,
    total_amount: Decimal,
    total_items: i32,
    shipping_address: Json<ShippingAddress>,
    payment_method: PaymentMethod,
    status: OrderStatus,
    payment_confirmed: bool,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            items: row.items.0,
            total_amount: row.total_amount,
            total_items: row.total_items,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method,
            status: row.status,
            payment_confirmed: row.payment_confirmed,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const fn sort_column(sort: OrderSort) -> &'static str {
    match sort {
        OrderSort::TotalAmount => "total_amount",
        OrderSort::PaymentMethod => "payment_method",
        OrderSort::CreatedAt => "created_at",
        OrderSort::UpdatedAt => "updated_at",
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn commit_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Consume the cart first. A concurrent checkout of the same snapshot
        // blocks on these rows and then deletes nothing.
        let consumed = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
            .bind(order.user_id)
            .bind(&order.cart_item_ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if usize::try_from(consumed).ok() != Some(order.cart_item_ids.len()) {
            tx.rollback().await?;
            return Err(RepositoryError::CartChanged);
        }

        // Ascending product id, so concurrent orders take row locks in the same order.
        let mut shortfalls = Vec::new();
        for (product_id, quantity) in order.demand() {
            let remaining: Option<i32> = sqlx::query_scalar(
                "UPDATE products SET stock = stock - $2, updated_at = now() \
                 WHERE id = $1 AND NOT deleted AND stock >= $2 RETURNING stock",
            )
            .bind(product_id)
            .bind(quantity)
            .fetch_optional(&mut *tx)
            .await?;

            if remaining.is_some() {
                continue;
            }

            let observed: Option<(String, i32, bool)> =
                sqlx::query_as("SELECT title, stock, deleted FROM products WHERE id = $1")
                    .bind(product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let (title, available) = match observed {
                Some((title, _, true)) => (title, 0),
                Some((title, stock, false)) => (title, stock),
                None => (
                    order
                        .items
                        .iter()
                        .find(|i| i.product_id == product_id)
                        .map(|i| i.title.clone())
                        .unwrap_or_default(),
                    0,
                ),
            };
            shortfalls.push(StockShortfall {
                product_id,
                title,
                requested: quantity,
                available,
            });
        }

        if !shortfalls.is_empty() {
            tx.rollback().await?;
            return Err(RepositoryError::InsufficientStock(shortfalls));
        }

        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "INSERT INTO orders (user_id, items, total_amount, total_items, shipping_address, \
             payment_method) VALUES ($1, $2, $3, $4, $5, $6) RETURNING ",
            order_columns!()
        ))
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(order.total_amount)
        .bind(order.total_items)
        .bind(Json(&order.shipping_address))
        .bind(order.payment_method)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        let mut list =
            QueryBuilder::<Postgres>::new(concat!("SELECT ", order_columns!(), " FROM orders"));
        list.push(" ORDER BY ")
            .push(sort_column(query.sort))
            .push(" ")
            .push(query.order.as_sql())
            .push(", id ")
            .push(query.order.as_sql())
            .push(" LIMIT ")
            .push_bind(i64::from(query.per_page))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset(query.page, query.per_page)).unwrap_or(i64::MAX));

        let rows: Vec<OrderRow> = list.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page {
            items: rows.into_iter().map(Order::from).collect(),
            total: u64::try_from(total).unwrap_or_default(),
            page: query.page,
            per_page: query.per_page,
        })
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "UPDATE orders SET status = $3, updated_at = now() \
             WHERE id = $1 AND status = $2 RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }
}
