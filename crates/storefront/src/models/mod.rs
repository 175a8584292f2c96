//! Domain models for the storefront.
//!
//! Stored records (`Product`, `Cart`, `Wishlist`, `Order`, `User`) and the
//! enriched views returned to clients (`CartView`, `WishlistView`,
//! `OrderDetails`). Views are computed at read time and never stored.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;
pub mod wishlist;

pub use cart::{Cart, CartItemView, CartLine, CartView};
pub use order::{NewOrder, Order, OrderDetails, OrderItem};
pub use product::{NewProduct, Product, ProductError, ProductPatch, ProductSummary};
pub use user::{NewUser, User, UserSummary};
pub use wishlist::{Wishlist, WishlistView};
