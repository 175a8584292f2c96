//! Integration tests for Toyshop.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory suites
//! cargo test -p toyshop-integration-tests
//!
//! # Postgres suites (database must be migrated)
//! TEST_DATABASE_URL=postgres://... cargo test -p toyshop-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `catalog` - Catalog query and rating aggregation
//! - `cart_wishlist` - Cart merging and wishlist set semantics
//! - `orders` - Order lifecycle, authorization and immutability
//! - `http_api` - Envelopes and status codes through the full router
//! - `postgres` - The same guarantees against a real database
//!
//! The helpers here drive the router in-process through
//! [`tower::ServiceExt::oneshot`], so no server has to be running.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use toyshop_core::{Caller, Price, Role, UserId};
use toyshop_storefront::config::StorefrontConfig;
use toyshop_storefront::middleware::{USER_ID_HEADER, USER_ROLE_HEADER};
use toyshop_storefront::models::{NewProduct, Product};
use toyshop_storefront::routes;
use toyshop_storefront::state::AppState;
use toyshop_storefront::store::{CatalogStore, MemoryStore};

/// A storefront wired to an in-memory store.
pub struct TestApp {
    pub state: AppState<MemoryStore>,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Storefront with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StorefrontConfig::default())
    }

    /// Storefront with a custom configuration.
    #[must_use]
    pub fn with_config(config: StorefrontConfig) -> Self {
        let state = AppState::new(config, MemoryStore::new());
        let router = routes::app(state.clone());
        Self { state, router }
    }

    /// The shared store behind the router.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        self.state.store()
    }

    /// Send a request as `caller` and decode the JSON body.
    ///
    /// Non-JSON bodies come back as `Value::Null`.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the router fails.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&Caller>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder
                .header(USER_ID_HEADER, caller.user_id.to_string())
                .header(USER_ROLE_HEADER, caller.role.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.send_request(request).await
    }

    /// Send a prepared request.
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body cannot be read.
    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

/// A customer with the given numeric ID.
#[must_use]
pub const fn customer(id: i32) -> Caller {
    Caller::customer(UserId::new(id))
}

/// An administrator with the given numeric ID.
#[must_use]
pub const fn admin(id: i32) -> Caller {
    Caller {
        user_id: UserId::new(id),
        role: Role::Admin,
    }
}

/// Parse a decimal literal.
///
/// # Panics
///
/// Panics on a malformed literal.
#[must_use]
pub fn dec(value: &str) -> Decimal {
    value.parse().expect("Invalid decimal literal")
}

/// A valid product draft.
///
/// # Panics
///
/// Panics on a negative price.
#[must_use]
pub fn draft(name: &str, brand: &str, price: &str, count_in_stock: u32) -> NewProduct {
    NewProduct {
        name: name.to_owned(),
        brand: brand.to_owned(),
        category: "Toys".to_owned(),
        description: format!("{name} by {brand}"),
        price: Price::new(dec(price)).expect("Invalid price"),
        count_in_stock,
        images: Vec::new(),
    }
}

/// Insert a product directly into a store.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn seed_product<S: CatalogStore>(
    store: &S,
    name: &str,
    brand: &str,
    price: &str,
    count_in_stock: u32,
) -> Product {
    store
        .insert_product(&draft(name, brand, price, count_in_stock))
        .await
        .expect("Failed to seed product")
}

/// Read a decimal serialized as a JSON string.
///
/// # Panics
///
/// Panics if the value is not a decimal string.
#[must_use]
pub fn json_dec(value: &Value) -> Decimal {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("Not a decimal string: {value}"))
}
