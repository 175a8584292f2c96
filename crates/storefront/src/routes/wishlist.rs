//! Wishlist route handlers.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use serde::Deserialize;
use tracing::instrument;

use toyshop_core::ProductId;

use super::ApiResponse;
use crate::error::Result;
use crate::middleware::RequireCaller;
use crate::models::WishlistView;
use crate::state::AppState;
use crate::store::Store;

/// Wishlist add body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

/// GET /api/wishlist
#[instrument(skip_all)]
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
) -> Result<ApiResponse<WishlistView>> {
    Ok(ApiResponse::ok(state.wishlists().read(&caller).await?))
}

/// POST /api/wishlist
#[instrument(skip_all)]
pub async fn add<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    body: std::result::Result<Json<WishlistRequest>, JsonRejection>,
) -> Result<ApiResponse<WishlistView>> {
    let Json(body) = body?;
    Ok(ApiResponse::ok(
        state.wishlists().add(&caller, body.product_id).await?,
    ))
}

/// DELETE /api/wishlist/{product_id}
#[instrument(skip_all)]
pub async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    product_id: std::result::Result<Path<ProductId>, PathRejection>,
) -> Result<ApiResponse<WishlistView>> {
    let Path(product_id) = product_id?;
    Ok(ApiResponse::ok(
        state.wishlists().remove(&caller, product_id).await?,
    ))
}

/// DELETE /api/wishlist
#[instrument(skip_all)]
pub async fn clear<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
) -> Result<ApiResponse<WishlistView>> {
    Ok(ApiResponse::ok(state.wishlists().clear(&caller).await?))
}
