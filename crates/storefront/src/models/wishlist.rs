//! Wishlist models.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use toyshop_core::{ProductId, UserId, WishlistId};

use super::product::{Product, ProductSummary};

/// A stored wishlist: a set of products in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    pub id: WishlistId,
    pub user_id: UserId,
    pub products: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wishlist {
    /// Add `product_id` unless already present.
    pub fn insert(&mut self, product_id: ProductId) -> bool {
        if self.products.contains(&product_id) {
            return false;
        }
        self.products.push(product_id);
        true
    }

    /// Remove `product_id` if present.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.products.len();
        self.products.retain(|id| *id != product_id);
        self.products.len() != before
    }
}

/// A wishlist as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistView {
    pub id: Option<WishlistId>,
    pub user_id: UserId,
    pub products: Vec<ProductSummary>,
}

impl WishlistView {
    #[must_use]
    pub const fn empty(user_id: UserId) -> Self {
        Self {
            id: None,
            user_id,
            products: Vec::new(),
        }
    }

    /// Join `wishlist` with its products, keeping insertion order.
    ///
    /// Products that no longer exist are skipped.
    #[must_use]
    pub fn build(wishlist: &Wishlist, products: &[Product]) -> Self {
        let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();
        Self {
            id: Some(wishlist.id),
            user_id: wishlist.user_id,
            products: wishlist
                .products
                .iter()
                .filter_map(|id| by_id.get(id).map(|p| p.summary()))
                .collect(),
        }
    }
}
