//! Cart types.
//!
//! A [`CartItem`] is what the shopper selected. A [`CartLine`] is that item
//! joined with the product as it is *now*, so prices and availability shown
//! in the cart always track the live catalog.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use amyfairy_core::{CartItemId, ProductId, UserId};

use super::product::Product;

/// A stored cart line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub color: Option<String>,
    pub size: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a cart item. New items always start at quantity 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub color: Option<String>,
    pub size: Option<String>,
}

impl NewCartItem {
    /// Whether an existing item has the same `(user, product, color, size)` key.
    #[must_use]
    pub fn same_key(&self, item: &CartItem) -> bool {
        self.user_id == item.user_id
            && self.product_id == item.product_id
            && self.color == item.color
            && self.size == item.size
    }
}

/// A cart item joined with current product data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub title: String,
    pub brand: String,
    pub thumbnail: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
    pub discount_percentage: Decimal,
    /// Current discounted unit price.
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Current product stock.
    pub stock: i32,
    pub deleted: bool,
    /// `false` when the product was removed or stock dropped below `quantity`.
    pub available: bool,
}

impl CartLine {
    /// Join an item with its product.
    #[must_use]
    pub fn new(item: &CartItem, product: &Product) -> Self {
        let unit_price = product.discounted_price();
        Self {
            id: item.id,
            product_id: product.id,
            title: product.title.clone(),
            brand: product.brand.clone(),
            thumbnail: product.thumbnail.clone(),
            color: item.color.clone(),
            size: item.size.clone(),
            quantity: item.quantity,
            price: product.price,
            discount_percentage: product.discount_percentage,
            unit_price,
            line_total: unit_price * Decimal::from(item.quantity),
            stock: product.stock,
            deleted: product.deleted,
            available: product.has_stock_for(item.quantity),
        }
    }
}

/// The shopper's cart as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_amount: Decimal,
    pub total_items: i64,
}

impl CartView {
    #[must_use]
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let total_amount = items.iter().map(|l| l.line_total).sum();
        let total_items = items.iter().map(|l| i64::from(l.quantity)).sum();
        Self {
            items,
            total_amount,
            total_items,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
