//! Storage traits for the commerce engine.
//!
//! The services are generic over a [`Store`], which bundles one trait per
//! aggregate. Two implementations exist:
//!
//! - [`PgStore`](crate::db::PgStore) - `PostgreSQL` via sqlx (production)
//! - [`MemoryStore`] - process-local maps behind locks (development, tests)
//!
//! Every mutating method is atomic with respect to the aggregate it touches:
//! rating updates never lose a concurrent submission, cart merges never lose
//! a concurrent add, and order state changes are compare-and-swap on
//! [`Order::version`].

pub mod memory;

use std::future::Future;

use toyshop_core::{
    OrderId, OrderStatus, Page, Payment, ProductId, ProductQuery, Quantity, RatingValue, UserId,
};

pub use crate::db::RepositoryError;
use crate::models::{
    Cart, NewOrder, NewProduct, NewUser, Order, Product, ProductPatch, User, Wishlist,
};
pub use memory::MemoryStore;

/// Catalog persistence.
pub trait CatalogStore: Send + Sync {
    /// Filter, sort and paginate the catalog.
    fn query_products(
        &self,
        query: &ProductQuery,
    ) -> impl Future<Output = Result<Page<Product>, RepositoryError>> + Send;

    /// A single product.
    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// All existing products among `ids`, in no particular order.
    fn get_products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// The product with exactly this brand and name.
    fn find_product(
        &self,
        brand: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Insert a product with no ratings.
    ///
    /// Fails with `RepositoryError::Conflict` on a duplicate brand+name.
    fn insert_product(
        &self,
        product: &NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Apply `patch`; `None` if the product does not exist.
    ///
    /// Fails with `RepositoryError::Conflict` on a duplicate brand+name.
    fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Delete a product and every cart or wishlist line pointing at it.
    ///
    /// Returns whether the product existed.
    fn delete_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Fold one rating into the product's aggregate atomically.
    fn record_rating(
        &self,
        id: ProductId,
        value: RatingValue,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;
}

/// Cart persistence. One cart per user, created on first mutation.
pub trait CartStore: Send + Sync {
    fn get_cart(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// Get-or-create the cart, then add `quantity` to the product's line
    /// (creating the line if needed).
    fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Cart, RepositoryError>> + Send;

    /// Overwrite a line's quantity; `None` if the cart or line is missing.
    fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// Drop a line; `None` if the cart or line is missing.
    fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// Get-or-create the cart and remove every line.
    fn clear_cart(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Cart, RepositoryError>> + Send;
}

/// Wishlist persistence. Every mutation gets-or-creates the wishlist.
pub trait WishlistStore: Send + Sync {
    fn get_wishlist(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Wishlist>, RepositoryError>> + Send;

    fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Wishlist, RepositoryError>> + Send;

    fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Wishlist, RepositoryError>> + Send;

    fn clear_wishlist(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Wishlist, RepositoryError>> + Send;
}

/// Order persistence.
pub trait OrderStore: Send + Sync {
    /// Insert an order in `Pending` status as one atomic write.
    fn insert_order(
        &self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn get_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Orders owned by `user_id`, newest first.
    fn list_orders_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Every order, newest first.
    fn list_orders(&self) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Replace status and payment if the stored version still equals
    /// `expected_version`, bumping the version.
    ///
    /// `None` means the order changed or disappeared since it was read.
    fn update_order_state(
        &self,
        id: OrderId,
        expected_version: i32,
        status: OrderStatus,
        payment: &Payment,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Returns whether the order existed.
    fn delete_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// User persistence.
pub trait UserStore: Send + Sync {
    /// Fails with `RepositoryError::Conflict` on a duplicate email.
    fn insert_user(
        &self,
        user: &NewUser,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// All existing users among `ids`.
    fn get_users(
        &self,
        ids: &[UserId],
    ) -> impl Future<Output = Result<Vec<User>, RepositoryError>> + Send;
}

/// A complete storage backend.
pub trait Store:
    CatalogStore + CartStore + WishlistStore + OrderStore + UserStore + Clone + 'static
{
    /// Check that the backend is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
