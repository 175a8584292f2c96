//! Toyshop Core - Domain types for the commerce engine.
//!
//! This crate provides the types shared by every Toyshop component:
//! - `storefront` - JSON API and the commerce consistency engine
//! - `cli` - Command-line tools for migrations, users and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. Validation that must happen before any state is touched
//! (quantities, ratings, addresses, prices, query parameters) lives here, as
//! do the order and payment state machines.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, quantities, ratings, emails,
//!   caller identity and order/payment statuses
//! - [`query`] - Catalog query model: filters, sort allow-list and pagination

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod query;
pub mod types;

pub use query::*;
pub use types::*;
