//! The commerce engine.
//!
//! # Services
//!
//! - `catalog` - Product query, administration and atomic ratings
//! - `cart` - Per-user aggregating cart
//! - `wishlist` - Per-user product set
//! - `orders` - Order snapshots and the status/payment state machines
//!
//! Every service borrows a [`Store`](crate::store::Store) and receives the
//! resolved [`Caller`](toyshop_core::Caller) for each operation. Checks run in
//! a fixed order: input validation, existence, authorization, mutation.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod orders;
pub mod wishlist;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use error::CommerceError;
pub use orders::{OrderLineRequest, OrderPolicy, OrderService, PlaceOrder};
pub use wishlist::WishlistService;
