//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                     - Liveness check
//! GET    /health/ready               - Store connectivity check
//!
//! # Catalog
//! GET    /api/products               - Filtered, sorted, paginated listing
//! GET    /api/products/{id}          - Product detail
//! POST   /api/products               - Create (admin)
//! PUT    /api/products/{id}          - Partial update (admin)
//! DELETE /api/products/{id}          - Delete (admin)
//! PUT    /api/products/{id}/rating   - Submit a rating
//!
//! # Cart
//! GET    /api/cart                   - Read
//! POST   /api/cart                   - Add (merges quantities)
//! PATCH  /api/cart                   - Set a line's quantity
//! DELETE /api/cart                   - Clear
//! DELETE /api/cart/{product_id}      - Remove a line
//!
//! # Wishlist
//! GET    /api/wishlist               - Read
//! POST   /api/wishlist               - Add
//! DELETE /api/wishlist               - Clear
//! DELETE /api/wishlist/{product_id}  - Remove
//!
//! # Orders
//! POST   /api/orders                 - Place an order
//! GET    /api/orders                 - All orders (admin)
//! GET    /api/orders/mine            - Caller's orders
//! GET    /api/orders/{id}            - Order detail (owner or admin)
//! PATCH  /api/orders/{id}/status     - Advance status (admin)
//! PATCH  /api/orders/{id}/payment    - Update payment (owner or admin)
//! DELETE /api/orders/{id}            - Delete (owner or admin)
//! ```
//!
//! Every `/api` route requires a caller resolved by the access gate.

pub mod cart;
pub mod health;
pub mod orders;
pub mod products;
pub mod wishlist;

use axum::{
    Json, Router,
    extract::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, put},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::middleware::request_id_middleware;
use crate::state::AppState;
use crate::store::Store;

// =============================================================================
// Response envelopes
// =============================================================================

/// Successful response carrying data: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wrap `data` in a success envelope.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Successful response carrying only a message: `{"success": true, "message": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    /// Wrap `message` in a success envelope.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiMessage {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

// =============================================================================
// Routers
// =============================================================================

/// Create the catalog routes router.
pub fn product_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(products::index::<S>).post(products::create::<S>))
        .route(
            "/{id}",
            get(products::show::<S>)
                .put(products::update::<S>)
                .delete(products::destroy::<S>),
        )
        .route("/{id}/rating", put(products::rate::<S>))
}

/// Create the cart routes router.
pub fn cart_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/",
            get(cart::show::<S>)
                .post(cart::add::<S>)
                .patch(cart::update::<S>)
                .delete(cart::clear::<S>),
        )
        .route("/{product_id}", axum::routing::delete(cart::remove::<S>))
}

/// Create the wishlist routes router.
pub fn wishlist_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/",
            get(wishlist::show::<S>)
                .post(wishlist::add::<S>)
                .delete(wishlist::clear::<S>),
        )
        .route(
            "/{product_id}",
            axum::routing::delete(wishlist::remove::<S>),
        )
}

/// Create the order routes router.
pub fn order_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(orders::index::<S>).post(orders::create::<S>))
        .route("/mine", get(orders::mine::<S>))
        .route(
            "/{id}",
            get(orders::show::<S>).delete(orders::destroy::<S>),
        )
        .route("/{id}/status", patch(orders::update_status::<S>))
        .route("/{id}/payment", patch(orders::update_payment::<S>))
}

/// Create all routes for the storefront.
pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<S>))
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/wishlist", wishlist_routes())
        .nest("/api/orders", order_routes())
}

/// The complete application: routes, state and the tracing middleware.
///
/// Sentry layers are added by the binary, where the client lives.
pub fn app<S: Store>(state: AppState<S>) -> Router {
    routes()
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
                user_id = tracing::field::Empty,
            )
        }))
}
