//! Order models.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use toyshop_core::{
    OrderId, OrderStatus, Payment, Price, PriceError, ProductId, Quantity, ShippingAddress, UserId,
};

use super::product::{Product, ProductSummary};
use super::user::{User, UserSummary};

/// One line of an order, frozen at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    /// Product name at the time of ordering.
    pub name: String,
    /// Product brand at the time of ordering.
    pub brand: String,
    pub quantity: Quantity,
    /// Unit price at the time of ordering.
    pub unit_price: Price,
}

impl OrderItem {
    /// Snapshot `product` for `quantity` units.
    #[must_use]
    pub fn snapshot(product: &Product, quantity: Quantity) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            brand: product.brand.clone(),
            quantity,
            unit_price: product.price,
        }
    }

    /// `unit_price * quantity`.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` on overflow.
    pub fn line_total(&self) -> Result<Price, PriceError> {
        self.unit_price.times(self.quantity)
    }
}

/// A placed order.
///
/// `order_items`, `shipping_address`, `total_price` and `user_id` never
/// change after creation. Only `status` and `payment` move, and every move
/// bumps `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment: Payment,
    pub total_price: Price,
    pub status: OrderStatus,
    #[serde(skip)]
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to insert an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment: Payment,
    pub total_price: Price,
}

impl NewOrder {
    /// Sum of all line totals.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` on overflow.
    pub fn computed_total(items: &[OrderItem]) -> Result<Price, PriceError> {
        items
            .iter()
            .try_fold(Price::ZERO, |acc, item| acc.checked_add(item.line_total()?))
    }
}

/// An order with its owner and live product data, for administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    /// `None` when the owner has no user record.
    pub user: Option<UserSummary>,
    /// Current product data per order line, aligned with `order_items`.
    pub products: Vec<Option<ProductSummary>>,
}

impl OrderDetails {
    /// Join orders with the users and products they reference.
    #[must_use]
    pub fn build_all(orders: Vec<Order>, users: &[User], products: &[Product]) -> Vec<Self> {
        let users: HashMap<UserId, &User> = users.iter().map(|u| (u.id, u)).collect();
        let products: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

        orders
            .into_iter()
            .map(|order| {
                let user = users.get(&order.user_id).map(|u| u.summary());
                let products = order
                    .order_items
                    .iter()
                    .map(|item| products.get(&item.product_id).map(|p| p.summary()))
                    .collect();
                Self {
                    order,
                    user,
                    products,
                }
            })
            .collect()
    }
}
