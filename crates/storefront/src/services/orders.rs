//! Order service.
//!
//! `place_order` turns the caller's cart into an immutable order. Stock is
//! checked twice: once against the cart snapshot for a friendly error, and
//! again by the conditional decrement inside the store's unit of work, which
//! is the check that actually guards against concurrent orders.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::instrument;

use amyfairy_core::{OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{
    CartLine, CurrentUser, NewOrder, Order, OrderQuery, Page, ShippingAddress, StockShortfall,
};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Nothing to order.
    #[error("your cart is empty")]
    EmptyCart,

    /// At least one product cannot cover the requested quantity.
    #[error("{}", describe_shortfalls(.0))]
    Stock(Vec<StockShortfall>),

    /// The cart was consumed or edited by a concurrent checkout.
    #[error("your cart changed while the order was being placed, please review it and retry")]
    CartChanged,

    /// Order does not exist or is not visible to the caller.
    #[error("order not found")]
    OrderNotFound,

    /// Caller is not an administrator.
    #[error("administrator access required")]
    Forbidden,

    /// Edge not in the fulfillment state machine.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Card order dispatched before its payment was reconciled.
    #[error("card payment has not been confirmed")]
    PaymentNotConfirmed,

    /// Another administrator changed the status first.
    #[error("order status changed concurrently, reload and retry")]
    StatusConflict,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

fn describe_shortfalls(shortfalls: &[StockShortfall]) -> String {
    let parts: Vec<String> = shortfalls.iter().map(ToString::to_string).collect();
    format!("insufficient stock: {}", parts.join("; "))
}

/// Shortfalls for a cart snapshot, aggregated per product.
fn snapshot_shortfalls(lines: &[CartLine]) -> Vec<StockShortfall> {
    let mut demand: BTreeMap<ProductId, (i32, &CartLine)> = BTreeMap::new();
    for line in lines {
        let entry = demand.entry(line.product_id).or_insert((0, line));
        entry.0 = entry.0.saturating_add(line.quantity);
    }

    demand
        .into_iter()
        .filter_map(|(product_id, (requested, line))| {
            let available = if line.deleted { 0 } else { line.stock };
            (requested > available).then(|| StockShortfall {
                product_id,
                title: line.title.clone(),
                requested,
                available,
            })
        })
        .collect()
}

/// Order service.
pub struct OrderService<'a> {
    store: &'a dyn Store,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Place an order from the caller's cart.
    ///
    /// On success stock is decremented, the order is stored with status
    /// `pending` and the ordered cart items are gone, all in one unit.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart`, `Stock` listing every product that cannot
    /// cover its quantity, or `CartChanged` if a concurrent checkout consumed
    /// the same cart. Nothing is committed on error.
    #[instrument(skip(self, user, shipping_address), fields(user_id = %user.id))]
    pub async fn place_order(
        &self,
        user: &CurrentUser,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<Order, OrderError> {
        let lines = self.store.cart_lines(user.id).await?;
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let shortfalls = snapshot_shortfalls(&lines);
        if !shortfalls.is_empty() {
            tracing::info!(count = shortfalls.len(), "order rejected on cart snapshot");
            return Err(OrderError::Stock(shortfalls));
        }

        let new_order = NewOrder::from_cart(user.id, &lines, shipping_address, payment_method);
        let order = self
            .store
            .commit_order(&new_order)
            .await
            .map_err(|e| match e {
                RepositoryError::InsufficientStock(shortfalls) => {
                    tracing::info!(count = shortfalls.len(), "order lost a stock race");
                    OrderError::Stock(shortfalls)
                }
                RepositoryError::CartChanged => {
                    tracing::info!("order lost a race for its own cart");
                    OrderError::CartChanged
                }
                other => OrderError::Repository(other),
            })?;

        tracing::info!(
            order_id = %order.id,
            total = %order.total_amount,
            payment_method = %order.payment_method,
            "order placed"
        );
        Ok(order)
    }

    /// Move an order along the fulfillment state machine.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `OrderNotFound`, `InvalidTransition`,
    /// `PaymentNotConfirmed` or `StatusConflict`.
    #[instrument(skip(self, admin), fields(admin_id = %admin.id))]
    pub async fn update_order_status(
        &self,
        admin: &CurrentUser,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order, OrderError> {
        if !admin.is_admin() {
            return Err(OrderError::Forbidden);
        }

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound)?;

        if !order.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: new_status,
            });
        }
        if new_status == OrderStatus::Dispatched && !order.is_settled_for_dispatch() {
            return Err(OrderError::PaymentNotConfirmed);
        }

        let updated = self
            .store
            .transition_order_status(order_id, order.status, new_status)
            .await?
            .ok_or(OrderError::StatusConflict)?;

        tracing::info!(from = %order.status, to = %new_status, "order status updated");
        Ok(updated)
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list_own_orders(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// One order, visible to its owner and to administrators.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` for unknown orders and other users' orders.
    pub async fn get_order(&self, user: &CurrentUser, order_id: OrderId) -> Result<Order, OrderError> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|o| o.user_id == user.id || user.is_admin())
            .ok_or(OrderError::OrderNotFound)
    }

    /// All orders, for administrators.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-administrators.
    pub async fn list_orders(
        &self,
        admin: &CurrentUser,
        query: &OrderQuery,
    ) -> Result<Page<Order>, OrderError> {
        if !admin.is_admin() {
            return Err(OrderError::Forbidden);
        }
        Ok(self.store.list_orders(query).await?)
    }
}
