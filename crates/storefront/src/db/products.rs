//! Product repository for database operations.
//!
//! The catalog query is assembled with `QueryBuilder` because its filters are
//! optional; everything else is a fixed runtime query.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use toyshop_core::{Page, Price, ProductId, ProductQuery, RatingSummary, RatingValue, SortField};

use super::{PgStore, RepositoryError};
use crate::models::{NewProduct, Product, ProductPatch};
use crate::store::CatalogStore;

const PRODUCT_COLUMNS: &str = "id, name, brand, category, description, price, count_in_stock, \
     images, rating, rating_sum, num_reviews, created_at, updated_at";

const DUPLICATE_PRODUCT: &str = "a product with this brand and name already exists";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    brand: String,
    category: String,
    description: String,
    price: Price,
    count_in_stock: i32,
    images: Vec<String>,
    rating: Decimal,
    rating_sum: Decimal,
    num_reviews: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let count_in_stock = u32::try_from(row.count_in_stock).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative stock for product {}: {}",
                row.id, row.count_in_stock
            ))
        })?;
        let num_reviews = u32::try_from(row.num_reviews).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative review count for product {}: {}",
                row.id, row.num_reviews
            ))
        })?;
        let rating = RatingSummary {
            rating: row.rating.normalize(),
            num_reviews,
            sum: row.rating_sum,
        };

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            brand: row.brand,
            category: row.category,
            description: row.description,
            price: row.price,
            count_in_stock,
            images: row.images,
            rating: rating.rating,
            num_reviews: rating.num_reviews,
            rating_sum: rating.sum,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn stock_to_db(count: u32) -> Result<i32, RepositoryError> {
    i32::try_from(count)
        .map_err(|_| RepositoryError::DataCorruption(format!("stock count out of range: {count}")))
}

/// Scale passed to `round()` so the stored mean matches `RatingSummary`.
fn rating_scale() -> i32 {
    i32::try_from(RatingSummary::SCALE).unwrap_or(i32::MAX)
}

const fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at",
        SortField::Price => "price",
        SortField::Rating => "rating",
        SortField::Name => "name",
    }
}

/// Append the `WHERE` conjuncts of `query` to a statement ending in `WHERE TRUE`.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    if let Some(keyword) = &query.keyword {
        builder
            .push(" AND (position(lower(")
            .push_bind(keyword.clone())
            .push(") in lower(name)) > 0 OR position(lower(")
            .push_bind(keyword.clone())
            .push(") in lower(description)) > 0)");
    }
    if let Some(brand) = &query.brand {
        builder.push(" AND brand = ").push_bind(brand.clone());
    }
    if let Some(category) = &query.category {
        builder.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(min) = query.min_price {
        builder.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        builder.push(" AND price <= ").push_bind(max);
    }
    if let Some(min) = query.min_rating {
        builder.push(" AND rating >= ").push_bind(min);
    }
    if query.in_stock_only {
        builder.push(" AND count_in_stock > 0");
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Run a catalog query.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn query(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM storefront.product WHERE TRUE");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let pagination = query.pagination;
        let offset = i64::try_from(pagination.offset()).unwrap_or(i64::MAX);

        let mut select = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE TRUE"
        ));
        push_filters(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(sort_column(query.sort))
            .push(" ")
            .push(query.order.as_sql())
            .push(", id ASC LIMIT ")
            .push_bind(i64::from(pagination.page_size()))
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<ProductRow> = select.build_query_as().fetch_all(self.pool).await?;
        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Product>, _>>()?;

        Ok(Page::new(
            items,
            u64::try_from(total).unwrap_or_default(),
            pagination,
        ))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row is invalid.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get every existing product among `ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row is invalid.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a product by its brand and name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row is invalid.
    pub async fn get_by_brand_and_name(
        &self,
        brand: &str,
        name: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE brand = $1 AND name = $2"
        ))
        .bind(brand)
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the brand and name are taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO storefront.product
                (name, brand, category, description, price, count_in_stock, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.price)
        .bind(stock_to_db(product.count_in_stock)?)
        .bind(&product.images)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, DUPLICATE_PRODUCT))?;

        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new brand and name are taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        let count_in_stock = patch.count_in_stock.map(stock_to_db).transpose()?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE storefront.product
            SET name = COALESCE($2, name),
                brand = COALESCE($3, brand),
                category = COALESCE($4, category),
                description = COALESCE($5, description),
                price = COALESCE($6, price),
                count_in_stock = COALESCE($7, count_in_stock),
                images = COALESCE($8, images),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.brand.as_deref())
        .bind(patch.category.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.price)
        .bind(count_in_stock)
        .bind(patch.images.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, DUPLICATE_PRODUCT))?;

        row.map(TryInto::try_into).transpose()
    }

    /// Delete a product. Cart and wishlist lines cascade; order lines do not
    /// reference the table.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fold one rating into the aggregate in a single statement.
    ///
    /// The stored `rating` column is what both the catalog filter and the
    /// returned product read, rounded like `RatingSummary::from_totals`.
    ///
    /// The row lock taken by `UPDATE` serializes concurrent submissions, and
    /// the right-hand sides read the row as it is after any earlier update
    /// commits, so no submission is lost.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_rating(
        &self,
        id: ProductId,
        value: RatingValue,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE storefront.product
            SET rating_sum = rating_sum + $2,
                num_reviews = num_reviews + 1,
                rating = round((rating_sum + $2) / (num_reviews + 1), $3),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(value.get())
        .bind(rating_scale())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

impl CatalogStore for PgStore {
    async fn query_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        ProductRepository::new(self.pool()).query(query).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(self.pool()).get_by_id(id).await
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(self.pool()).get_many(ids).await
    }

    async fn find_product(
        &self,
        brand: &str,
        name: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(self.pool())
            .get_by_brand_and_name(brand, name)
            .await
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        ProductRepository::new(self.pool()).create(product).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(self.pool()).update(id, patch).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        ProductRepository::new(self.pool()).delete(id).await
    }

    async fn record_rating(
        &self,
        id: ProductId,
        value: RatingValue,
    ) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(self.pool())
            .record_rating(id, value)
            .await
    }
}
