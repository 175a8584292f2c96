//! Toyshop Storefront library.
//!
//! The commerce consistency engine behind the Toyshop JSON API: catalog
//! queries and atomic ratings, per-user carts and wishlists, and the order
//! lifecycle. Provided as a library so the binary, the CLI and the
//! integration tests share one implementation.
//!
//! # Layers
//!
//! - [`store`] - Storage traits plus the in-memory backend
//! - [`db`] - `PostgreSQL` backend
//! - [`services`] - Engine operations and their error taxonomy
//! - [`routes`] - axum handlers and the response envelope

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
