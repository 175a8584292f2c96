//! Cart route handlers.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use serde::Deserialize;
use tracing::instrument;

use toyshop_core::{ProductId, Quantity};

use super::ApiResponse;
use crate::error::Result;
use crate::middleware::RequireCaller;
use crate::models::CartView;
use crate::services::CommerceError;
use crate::state::AppState;
use crate::store::Store;

/// Cart line request body for add and set-quantity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    pub product_id: ProductId,
    /// Raw so that zero and negative values get a domain error message.
    #[serde(default = "one")]
    pub quantity: i64,
}

const fn one() -> i64 {
    1
}

impl CartItemRequest {
    fn quantity(&self) -> std::result::Result<Quantity, CommerceError> {
        Ok(Quantity::new(self.quantity)?)
    }
}

/// Read the caller's cart.
///
/// GET /api/cart
#[instrument(skip_all)]
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
) -> Result<ApiResponse<CartView>> {
    Ok(ApiResponse::ok(state.carts().read(&caller).await?))
}

/// Add to cart, merging with an existing line.
///
/// POST /api/cart
#[instrument(skip_all)]
pub async fn add<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    body: std::result::Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<ApiResponse<CartView>> {
    let Json(item) = body?;
    let quantity = item.quantity()?;
    Ok(ApiResponse::ok(
        state.carts().add(&caller, item.product_id, quantity).await?,
    ))
}

/// Overwrite a line's quantity.
///
/// PATCH /api/cart
#[instrument(skip_all)]
pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    body: std::result::Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<ApiResponse<CartView>> {
    let Json(item) = body?;
    let quantity = item.quantity()?;
    Ok(ApiResponse::ok(
        state
            .carts()
            .set_quantity(&caller, item.product_id, quantity)
            .await?,
    ))
}

/// Remove a line.
///
/// DELETE /api/cart/{product_id}
#[instrument(skip_all)]
pub async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    product_id: std::result::Result<Path<ProductId>, PathRejection>,
) -> Result<ApiResponse<CartView>> {
    let Path(product_id) = product_id?;
    Ok(ApiResponse::ok(
        state.carts().remove(&caller, product_id).await?,
    ))
}

/// Empty the cart.
///
/// DELETE /api/cart
#[instrument(skip_all)]
pub async fn clear<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
) -> Result<ApiResponse<CartView>> {
    Ok(ApiResponse::ok(state.carts().clear(&caller).await?))
}
