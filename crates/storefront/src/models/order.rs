//! Order types.
//!
//! Orders freeze everything that matters for fulfillment and accounting:
//! line prices, quantities, totals and the shipping address. Nothing here is
//! recomputed from the live catalog after creation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use amyfairy_core::{CartItemId, OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::cart::CartLine;
use super::page::SortOrder;

/// A frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub title: String,
    pub brand: String,
    pub thumbnail: String,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Discounted unit price at order time.
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            title: line.title.clone(),
            brand: line.brand.clone(),
            thumbnail: line.thumbnail.clone(),
            color: line.color.clone(),
            size: line.size.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total: line.unit_price * Decimal::from(line.quantity),
        }
    }
}

/// Shipping address copied onto the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub pin_code: String,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub total_items: i32,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_confirmed: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether fulfillment may treat the order as paid.
    ///
    /// Cash orders are collected on delivery, so they never wait on the
    /// gateway.
    #[must_use]
    pub const fn is_settled_for_dispatch(&self) -> bool {
        match self.payment_method {
            PaymentMethod::Cash => true,
            PaymentMethod::Card => self.payment_confirmed,
        }
    }
}

/// Insert payload for an order, built from a cart snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub total_items: i32,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// Cart items consumed by this order; deleted in the same unit of work.
    pub cart_item_ids: Vec<CartItemId>,
}

impl NewOrder {
    /// Freeze a cart snapshot into an order payload.
    #[must_use]
    pub fn from_cart(
        user_id: UserId,
        lines: &[CartLine],
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        let items: Vec<OrderItem> = lines.iter().map(OrderItem::from).collect();
        let total_amount = items.iter().map(|i| i.line_total).sum();
        let total_items = items.iter().fold(0_i32, |n, i| n.saturating_add(i.quantity));
        Self {
            user_id,
            items,
            total_amount,
            total_items,
            shipping_address,
            payment_method,
            cart_item_ids: lines.iter().map(|l| l.id).collect(),
        }
    }

    /// Quantity per product, ascending by product id. Sums saturate, so an
    /// absurd total fails the stock check instead of wrapping.
    ///
    /// Stock is decremented in this order so concurrent orders lock rows in
    /// the same sequence.
    #[must_use]
    pub fn demand(&self) -> Vec<(ProductId, i32)> {
        let mut demand: std::collections::BTreeMap<ProductId, i32> =
            std::collections::BTreeMap::new();
        for item in &self.items {
            let total = demand.entry(item.product_id).or_default();
            *total = total.saturating_add(item.quantity);
        }
        demand.into_iter().collect()
    }
}

/// A product that cannot cover the requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortfall {
    pub product_id: ProductId,
    pub title: String,
    pub requested: i32,
    pub available: i32,
}

impl std::fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.available <= 0 {
            write!(f, "{} is out of stock", self.title)
        } else {
            write!(f, "{}: only {} left in stock", self.title, self.available)
        }
    }
}

/// Admin order sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSort {
    TotalAmount,
    PaymentMethod,
    #[default]
    CreatedAt,
    UpdatedAt,
}

/// Admin order listing query, already normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderQuery {
    pub sort: OrderSort,
    pub order: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            sort: OrderSort::default(),
            order: SortOrder::Desc,
            page: 1,
            per_page: super::page::DEFAULT_PER_PAGE,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::cart::CartItem;
    use crate::models::product::tests::product;

    fn line(id: i64, product_id: i64, price: &str, quantity: i32) -> CartLine {
        let now = Utc::now();
        let item = CartItem {
            id: CartItemId::new(id),
            user_id: UserId::new(1),
            product_id: ProductId::new(product_id),
            quantity,
            color: None,
            size: None,
            created_at: now,
            updated_at: now,
        };
        CartLine::new(&item, &product(product_id, price, "10", 10))
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Amy".to_owned(),
            email: "amy@example.com".to_owned(),
            phone: "9999999999".to_owned(),
            street: "1 MG Road".to_owned(),
            city: "Bengaluru".to_owned(),
            state: "KA".to_owned(),
            pin_code: "560001".to_owned(),
        }
    }

    #[test]
    fn test_from_cart_freezes_totals() {
        let lines = vec![line(1, 2, "100", 2), line(2, 1, "50", 1)];
        let order = NewOrder::from_cart(UserId::new(1), &lines, address(), PaymentMethod::Cash);

        // 90 * 2 + 45 * 1
        assert_eq!(order.total_amount, Decimal::from(225));
        assert_eq!(order.total_items, 3);
        assert_eq!(
            order.cart_item_ids,
            vec![CartItemId::new(1), CartItemId::new(2)]
        );
        let sum: Decimal = order
            .items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();
        assert_eq!(sum, order.total_amount);
    }

    #[test]
    fn test_demand_sorted_and_merged() {
        let lines = vec![line(1, 5, "10", 1), line(2, 2, "10", 2), line(3, 5, "10", 3)];
        let order = NewOrder::from_cart(UserId::new(1), &lines, address(), PaymentMethod::Card);
        assert_eq!(
            order.demand(),
            vec![(ProductId::new(2), 2), (ProductId::new(5), 4)]
        );
    }

    #[test]
    fn test_demand_saturates() {
        let lines = vec![line(1, 3, "10", i32::MAX), line(2, 3, "10", 5)];
        let order = NewOrder::from_cart(UserId::new(1), &lines, address(), PaymentMethod::Cash);
        assert_eq!(order.demand(), vec![(ProductId::new(3), i32::MAX)]);
        assert_eq!(order.total_items, i32::MAX);
    }

    #[test]
    fn test_shortfall_message() {
        let s = StockShortfall {
            product_id: ProductId::new(1),
            title: "Scarf".to_owned(),
            requested: 3,
            available: 2,
        };
        assert_eq!(s.to_string(), "Scarf: only 2 left in stock");
    }
}
