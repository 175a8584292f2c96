//! Shopping cart models.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use toyshop_core::{CartId, Price, PriceError, ProductId, Quantity, UserId};

use super::product::{Product, ProductSummary};

/// A stored cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// A stored cart. At most one per user; lines never repeat a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// The line for `product_id`, if present.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.items.iter().find(|line| line.product_id == product_id)
    }

    /// Product IDs referenced by this cart, in line order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|line| line.product_id).collect()
    }
}

/// A cart line joined with the live product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// `None` when the product disappeared between the cart and product reads.
    pub product: Option<ProductSummary>,
    pub line_total: Price,
}

/// A cart as returned to clients, with totals computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    /// `None` until the first mutation creates the cart.
    pub id: Option<CartId>,
    pub user_id: UserId,
    pub items: Vec<CartItemView>,
    pub item_count: u64,
    pub subtotal: Price,
}

impl CartView {
    /// The view of a user who never touched their cart.
    #[must_use]
    pub const fn empty(user_id: UserId) -> Self {
        Self {
            id: None,
            user_id,
            items: Vec::new(),
            item_count: 0,
            subtotal: Price::ZERO,
        }
    }

    /// Join `cart` with the products it references.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if a line total or the subtotal overflows.
    pub fn build(cart: &Cart, products: &[Product]) -> Result<Self, PriceError> {
        let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let product = by_id.get(&line.product_id);
            let line_total = match product {
                Some(product) => product.price.times(line.quantity)?,
                None => Price::ZERO,
            };
            items.push(CartItemView {
                product_id: line.product_id,
                quantity: line.quantity,
                product: product.map(|p| p.summary()),
                line_total,
            });
        }

        let subtotal = Price::sum(items.iter().map(|item| item.line_total))?;
        let item_count = items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum();

        Ok(Self {
            id: Some(cart.id),
            user_id: cart.user_id,
            items,
            item_count,
            subtotal,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i32, cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Toy {id}"),
            brand: "Acme".to_string(),
            category: "Toys".to_string(),
            description: String::new(),
            price: Price::new(Decimal::new(cents, 2)).unwrap(),
            count_in_stock: 5,
            images: Vec::new(),
            rating: Decimal::ZERO,
            num_reviews: 0,
            rating_sum: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    fn cart(lines: &[(i32, i64)]) -> Cart {
        let now = Utc::now();
        Cart {
            id: CartId::new(1),
            user_id: UserId::new(7),
            items: lines
                .iter()
                .map(|&(id, qty)| CartLine {
                    product_id: ProductId::new(id),
                    quantity: Quantity::new(qty).unwrap(),
                })
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_totals_computed_from_live_prices() {
        let view = CartView::build(
            &cart(&[(1, 2), (2, 1)]),
            &[product(1, 1000), product(2, 250)],
        )
        .unwrap();
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal.amount(), Decimal::new(2250, 2));
        assert_eq!(view.items[0].line_total.amount(), Decimal::new(2000, 2));
    }

    #[test]
    fn test_missing_product_counts_as_zero() {
        let view = CartView::build(&cart(&[(1, 2), (9, 4)]), &[product(1, 100)]).unwrap();
        assert!(view.items[1].product.is_none());
        assert_eq!(view.subtotal.amount(), Decimal::new(200, 2));
        assert_eq!(view.item_count, 6);
    }

    #[test]
    fn test_empty_view() {
        let view = CartView::empty(UserId::new(3));
        assert!(view.id.is_none());
        assert!(view.items.is_empty());
        assert_eq!(view.subtotal, Price::ZERO);
    }
}
