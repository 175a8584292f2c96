//! Core types for Toyshop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod caller;
pub mod email;
pub mod id;
pub mod payment;
pub mod price;
pub mod quantity;
pub mod rating;
pub mod status;

pub use address::{AddressError, ShippingAddress};
pub use caller::{Caller, Role, RoleError};
pub use email::{Email, EmailError};
pub use id::*;
pub use payment::{DEFAULT_PAYMENT_METHOD, Payment, PaymentError, PaymentUpdate};
pub use price::{Price, PriceError};
pub use quantity::{Quantity, QuantityError};
pub use rating::{RatingError, RatingSummary, RatingValue};
pub use status::*;
