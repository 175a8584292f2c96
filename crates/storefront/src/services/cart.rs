//! Cart service: one aggregating cart per user.

use tracing::instrument;

use toyshop_core::{Caller, ProductId, Quantity};

use super::CommerceError;
use crate::models::{Cart, CartView};
use crate::store::Store;

/// Cart operations, always on the caller's own cart.
pub struct CartService<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> CartService<'a, S> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    async fn enrich(&self, cart: &Cart) -> Result<CartView, CommerceError> {
        let products = self.store.get_products(&cart.product_ids()).await?;
        Ok(CartView::build(cart, &products)?)
    }

    /// The caller's cart with live product data. A user who never touched
    /// their cart gets an empty one; nothing is created.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Internal` if storage fails.
    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn read(&self, caller: &Caller) -> Result<CartView, CommerceError> {
        match self.store.get_cart(caller.user_id).await? {
            Some(cart) => self.enrich(&cart).await,
            None => Ok(CartView::empty(caller.user_id)),
        }
    }

    /// Add units of a product. An existing line is incremented, never
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the product does not exist and
    /// `CommerceError::InvalidInput` if the merged quantity is too large.
    #[instrument(skip(self), fields(user_id = %caller.user_id, product_id = %product_id))]
    pub async fn add(
        &self,
        caller: &Caller,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartView, CommerceError> {
        if self.store.get_product(product_id).await?.is_none() {
            return Err(CommerceError::not_found("Product"));
        }
        if let Some(cart) = self.store.get_cart(caller.user_id).await?
            && let Some(line) = cart.line(product_id)
        {
            line.quantity.merge(quantity)?;
        }

        let cart = self
            .store
            .add_to_cart(caller.user_id, product_id, quantity)
            .await?;
        self.enrich(&cart).await
    }

    /// Overwrite the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the caller has no cart or the
    /// cart has no line for the product.
    #[instrument(skip(self), fields(user_id = %caller.user_id, product_id = %product_id))]
    pub async fn set_quantity(
        &self,
        caller: &Caller,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartView, CommerceError> {
        let cart = self
            .store
            .get_cart(caller.user_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Cart"))?;
        if cart.line(product_id).is_none() {
            return Err(CommerceError::not_found("Item in cart"));
        }

        let cart = self
            .store
            .set_cart_quantity(caller.user_id, product_id, quantity)
            .await?
            .ok_or_else(|| CommerceError::not_found("Item in cart"))?;
        self.enrich(&cart).await
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the caller has no cart or the
    /// cart has no line for the product.
    #[instrument(skip(self), fields(user_id = %caller.user_id, product_id = %product_id))]
    pub async fn remove(
        &self,
        caller: &Caller,
        product_id: ProductId,
    ) -> Result<CartView, CommerceError> {
        let cart = self
            .store
            .get_cart(caller.user_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Cart"))?;
        if cart.line(product_id).is_none() {
            return Err(CommerceError::not_found("Item in cart"));
        }

        let cart = self
            .store
            .remove_from_cart(caller.user_id, product_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Item in cart"))?;
        self.enrich(&cart).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Internal` if storage fails.
    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn clear(&self, caller: &Caller) -> Result<CartView, CommerceError> {
        let cart = self.store.clear_cart(caller.user_id).await?;
        self.enrich(&cart).await
    }
}
