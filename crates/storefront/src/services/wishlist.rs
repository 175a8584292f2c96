//! Wishlist service: a per-user set of products.

use tracing::instrument;

use toyshop_core::{Caller, ProductId};

use super::CommerceError;
use crate::models::{Wishlist, WishlistView};
use crate::store::Store;

/// Wishlist operations, always on the caller's own wishlist.
pub struct WishlistService<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> WishlistService<'a, S> {
    /// Create a new wishlist service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    async fn enrich(&self, wishlist: &Wishlist) -> Result<WishlistView, CommerceError> {
        let products = self.store.get_products(&wishlist.products).await?;
        Ok(WishlistView::build(wishlist, &products))
    }

    /// The caller's wishlist, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Internal` if storage fails.
    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn read(&self, caller: &Caller) -> Result<WishlistView, CommerceError> {
        match self.store.get_wishlist(caller.user_id).await? {
            Some(wishlist) => self.enrich(&wishlist).await,
            None => Ok(WishlistView::empty(caller.user_id)),
        }
    }

    /// Add a product. Adding one already present changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(user_id = %caller.user_id, product_id = %product_id))]
    pub async fn add(
        &self,
        caller: &Caller,
        product_id: ProductId,
    ) -> Result<WishlistView, CommerceError> {
        if self.store.get_product(product_id).await?.is_none() {
            return Err(CommerceError::not_found("Product"));
        }
        let wishlist = self
            .store
            .add_to_wishlist(caller.user_id, product_id)
            .await?;
        self.enrich(&wishlist).await
    }

    /// Remove a product. Removing one that is absent succeeds.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Internal` if storage fails.
    #[instrument(skip(self), fields(user_id = %caller.user_id, product_id = %product_id))]
    pub async fn remove(
        &self,
        caller: &Caller,
        product_id: ProductId,
    ) -> Result<WishlistView, CommerceError> {
        let wishlist = self
            .store
            .remove_from_wishlist(caller.user_id, product_id)
            .await?;
        self.enrich(&wishlist).await
    }

    /// Empty the wishlist.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Internal` if storage fails.
    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn clear(&self, caller: &Caller) -> Result<WishlistView, CommerceError> {
        let wishlist = self.store.clear_wishlist(caller.user_id).await?;
        self.enrich(&wishlist).await
    }
}
