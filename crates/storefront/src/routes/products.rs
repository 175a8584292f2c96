//! Catalog route handlers.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use toyshop_core::{Pagination, ProductId, ProductQuery, QueryError, RatingValue};

use super::{ApiMessage, ApiResponse};
use crate::error::Result;
use crate::middleware::{FromGateway, RequireCaller};
use crate::models::{NewProduct, Product, ProductPatch};
use crate::services::CommerceError;
use crate::state::AppState;
use crate::store::Store;

/// Catalog listing query parameters.
///
/// Sort and order stay strings here so that unknown values are reported
/// with the allowed set instead of a generic parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductListParams {
    #[serde(alias = "q")]
    pub keyword: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_rating: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "limit")]
    pub page_size: Option<i64>,
}

impl ProductListParams {
    /// Validate into a catalog query.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` for unknown sort fields or directions and for
    /// non-positive or oversized pagination.
    pub fn into_query(self, max_page_size: u32) -> std::result::Result<ProductQuery, QueryError> {
        let pagination = Pagination::new(
            self.page.unwrap_or(i64::from(Pagination::DEFAULT_PAGE)),
            self.page_size
                .unwrap_or(i64::from(Pagination::DEFAULT_PAGE_SIZE)),
            max_page_size,
        )?;

        Ok(ProductQuery {
            keyword: self.keyword,
            brand: self.brand,
            category: self.category,
            min_price: self.min_price,
            max_price: self.max_price,
            min_rating: self.min_rating,
            in_stock_only: self.in_stock.unwrap_or(false),
            sort: self.sort.as_deref().map(str::parse).transpose()?.unwrap_or_default(),
            order: self.order.as_deref().map(str::parse).transpose()?.unwrap_or_default(),
            pagination,
        }
        .normalized())
    }
}

/// Catalog page: the standard envelope plus paging totals.
#[derive(Debug, Serialize)]
pub struct ProductPageResponse {
    pub success: bool,
    pub data: Vec<Product>,
    pub total: u64,
    pub page: u32,
    pub pages: u64,
}

/// Rating submission body.
#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: Decimal,
}

/// List products.
///
/// GET /api/products
#[instrument(skip_all)]
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(_caller): RequireCaller,
    params: std::result::Result<Query<ProductListParams>, QueryRejection>,
) -> Result<Json<ProductPageResponse>> {
    let Query(params) = params?;
    let query = params
        .into_query(state.config().max_page_size)
        .map_err(CommerceError::from)?;

    let page = state.catalog().query(&query).await?;
    Ok(Json(ProductPageResponse {
        success: true,
        data: page.items,
        total: page.total,
        page: page.page,
        pages: page.pages,
    }))
}

/// Show one product. Public: no identity required.
///
/// GET /api/products/{id}
#[instrument(skip_all)]
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    _gateway: FromGateway,
    id: std::result::Result<Path<ProductId>, PathRejection>,
) -> Result<ApiResponse<Product>> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.catalog().get(id).await?))
}

/// Create a product.
///
/// POST /api/products
#[instrument(skip_all)]
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    body: std::result::Result<Json<NewProduct>, JsonRejection>,
) -> Result<Response> {
    let Json(input) = body?;
    let product = state.catalog().create(&caller, input).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(product)).into_response())
}

/// Update a product.
///
/// PUT /api/products/{id}
#[instrument(skip_all)]
pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    id: std::result::Result<Path<ProductId>, PathRejection>,
    body: std::result::Result<Json<ProductPatch>, JsonRejection>,
) -> Result<ApiResponse<Product>> {
    let Path(id) = id?;
    let Json(patch) = body?;
    Ok(ApiResponse::ok(
        state.catalog().update(&caller, id, patch).await?,
    ))
}

/// Delete a product.
///
/// DELETE /api/products/{id}
#[instrument(skip_all)]
pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    id: std::result::Result<Path<ProductId>, PathRejection>,
) -> Result<ApiMessage> {
    let Path(id) = id?;
    state.catalog().delete(&caller, id).await?;
    Ok(ApiMessage::ok("Product removed"))
}

/// Submit a rating.
///
/// PUT /api/products/{id}/rating
#[instrument(skip_all)]
pub async fn rate<S: Store>(
    State(state): State<AppState<S>>,
    RequireCaller(caller): RequireCaller,
    id: std::result::Result<Path<ProductId>, PathRejection>,
    body: std::result::Result<Json<RatingRequest>, JsonRejection>,
) -> Result<ApiResponse<Product>> {
    let Path(id) = id?;
    let Json(body) = body?;
    let value = RatingValue::new(body.rating).map_err(CommerceError::from)?;
    Ok(ApiResponse::ok(
        state.catalog().rate(&caller, id, value).await?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use toyshop_core::{SortField, SortOrder};

    use super::*;

    #[test]
    fn test_defaults() {
        let query = ProductListParams::default().into_query(100).unwrap();
        assert_eq!(query.sort, SortField::CreatedAt);
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!(query.pagination.page(), 1);
        assert_eq!(query.pagination.page_size(), 10);
        assert!(!query.in_stock_only);
    }

    #[test]
    fn test_unknown_sort_rejected() {
        let params = ProductListParams {
            sort: Some("popularity".to_string()),
            ..ProductListParams::default()
        };
        assert!(matches!(
            params.into_query(100),
            Err(QueryError::UnknownSortField(_))
        ));
    }

    #[test]
    fn test_page_size_capped() {
        let params = ProductListParams {
            page_size: Some(500),
            ..ProductListParams::default()
        };
        assert!(matches!(
            params.into_query(100),
            Err(QueryError::PageSizeTooLarge { max: 100 })
        ));
    }

    #[test]
    fn test_blank_keyword_dropped() {
        let params = ProductListParams {
            keyword: Some("   ".to_string()),
            ..ProductListParams::default()
        };
        assert!(params.into_query(100).unwrap().keyword.is_none());
    }
}
