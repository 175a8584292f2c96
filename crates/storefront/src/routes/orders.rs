//! Order route handlers.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use toyshop_core::{OrderId, OrderStatus, PaymentUpdate};

use super::{ApiMessage, ApiResponse};
use crate::error::Result;
use crate::middleware::RequireCaller;
use crate::models::{Order, OrderDetails};
use crate::services::PlaceOrder;
use crate::state::AppState;
use crate::store::Store;

/// Status change body.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// Place an order.
///
/// POST /api/orders
#[instrument(skip_all)]
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    body: std::result::Result<Json<PlaceOrder>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = body?;
    let order = state.orders().create(&caller, request).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(order)).into_response())
}

/// Every order, enriched (admin).
///
/// GET /api/orders
#[instrument(skip_all)]
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
) -> Result<ApiResponse<Vec<OrderDetails>>> {
    Ok(ApiResponse::ok(state.orders().list_all(&caller).await?))
}

/// The caller's orders.
///
/// GET /api/orders/mine
#[instrument(skip_all)]
pub async fn mine<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
) -> Result<ApiResponse<Vec<Order>>> {
    Ok(ApiResponse::ok(state.orders().list_mine(&caller).await?))
}

/// One order.
///
/// GET /api/orders/{id}
#[instrument(skip_all)]
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    id: std::result::Result<Path<OrderId>, PathRejection>,
) -> Result<ApiResponse<Order>> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.orders().get(&caller, id).await?))
}

/// Advance the order status (admin).
///
/// PATCH /api/orders/{id}/status
#[instrument(skip_all)]
pub async fn update_status<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    id: std::result::Result<Path<OrderId>, PathRejection>,
    body: std::result::Result<Json<StatusRequest>, JsonRejection>,
) -> Result<ApiResponse<Order>> {
    let Path(id) = id?;
    let Json(body) = body?;
    Ok(ApiResponse::ok(
        state
            .orders()
            .update_status(&caller, id, body.status)
            .await?,
    ))
}

/// Merge a payment update.
///
/// PATCH /api/orders/{id}/payment
#[instrument(skip_all)]
pub async fn update_payment<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    id: std::result::Result<Path<OrderId>, PathRejection>,
    body: std::result::Result<Json<PaymentUpdate>, JsonRejection>,
) -> Result<ApiResponse<Order>> {
    let Path(id) = id?;
    let Json(update) = body?;
    Ok(ApiResponse::ok(
        state.orders().update_payment(&caller, id, &update).await?,
    ))
}

/// Delete an order.
///
/// DELETE /api/orders/{id}
#[instrument(skip_all)]
pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    id: std::result::Result<Path<OrderId>, PathRejection>,
) -> Result<ApiMessage> {
    let Path(id) = id?;
    state.orders().delete(&caller, id).await?;
    Ok(ApiMessage::ok("Order removed"))
}
