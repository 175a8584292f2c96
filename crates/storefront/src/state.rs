//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::services::{CartService, CatalogService, OrderService, WishlistService};
use crate::store::Store;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and carries the configuration
/// and the storage handle every service borrows.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    config: StorefrontConfig,
    store: S,
}

// Manual impl: `S` itself does not need to be `Clone` for the `Arc` to be.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store> AppState<S> {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, store: S) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, store }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Catalog service over this state's store.
    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_, S> {
        CatalogService::new(self.store())
    }

    /// Cart service over this state's store.
    #[must_use]
    pub fn carts(&self) -> CartService<'_, S> {
        CartService::new(self.store())
    }

    /// Wishlist service over this state's store.
    #[must_use]
    pub fn wishlists(&self) -> WishlistService<'_, S> {
        WishlistService::new(self.store())
    }

    /// Order service over this state's store, with the configured policy.
    #[must_use]
    pub fn orders(&self) -> OrderService<'_, S> {
        OrderService::new(self.store(), self.config().order_policy)
    }
}
