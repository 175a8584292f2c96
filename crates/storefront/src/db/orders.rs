//! Order repository for database operations.
//!
//! Orders are written once with their lines in a single transaction. After
//! that only the status and payment columns change, guarded by `version`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use toyshop_core::{
    OrderId, OrderStatus, Payment, PaymentStatus, Price, ProductId, Quantity, ShippingAddress,
    UserId,
};

use super::{PgStore, RepositoryError};
use crate::models::{NewOrder, Order, OrderItem};
use crate::store::OrderStore;

const ORDER_COLUMNS: &str = "id, user_id, address, city, postal_code, country, payment_status, \
     payment_method, paid_at, transaction_id, total_price, status, version, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    address: String,
    city: String,
    postal_code: String,
    country: String,
    payment_status: PaymentStatus,
    payment_method: String,
    paid_at: Option<DateTime<Utc>>,
    transaction_id: Option<String>,
    total_price: Price,
    status: OrderStatus,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, order_items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            order_items,
            shipping_address: ShippingAddress {
                address: self.address,
                city: self.city,
                postal_code: self.postal_code,
                country: self.country,
            },
            payment: Payment {
                status: self.payment_status,
                method: self.payment_method,
                paid_at: self.paid_at,
                transaction_id: self.transaction_id,
            },
            total_price: self.total_price,
            status: self.status,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    product_id: i32,
    name: String,
    brand: String,
    quantity: i32,
    unit_price: Price,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::try_from(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid quantity on order {}: {e}",
                row.order_id
            ))
        })?;
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            brand: row.brand,
            quantity,
            unit_price: row.unit_price,
        })
    }
}

/// Load the lines of `orders` and attach them, preserving the order of `rows`.
async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();

    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT order_id, product_id, name, brand, quantity, unit_price
        FROM storefront.order_item
        WHERE order_id = ANY($1)
        ORDER BY order_id, id
        ",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    let mut items: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        let order_id = row.order_id;
        items.entry(order_id).or_default().push(row.try_into()?);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let lines = items.remove(&row.id).unwrap_or_default();
            row.into_order(lines)
        })
        .collect())
}

async fn attach_one(conn: &mut PgConnection, row: OrderRow) -> Result<Order, RepositoryError> {
    attach_items(conn, vec![row])
        .await?
        .pop()
        .ok_or_else(|| RepositoryError::DataCorruption("order vanished while loading".to_owned()))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; nothing is
    /// written in that case.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO storefront.customer_order
                (user_id, address, city, postal_code, country,
                 payment_status, payment_method, paid_at, transaction_id, total_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(&order.shipping_address.address)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.postal_code)
        .bind(&order.shipping_address.country)
        .bind(order.payment.status)
        .bind(&order.payment.method)
        .bind(order.payment.paid_at)
        .bind(order.payment.transaction_id.as_deref())
        .bind(order.total_price)
        .fetch_one(&mut *tx)
        .await?;

        for item in &order.order_items {
            sqlx::query(
                r"
                INSERT INTO storefront.order_item
                    (order_id, product_id, name, brand, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(row.id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(&item.brand)
            .bind(i32::from(item.quantity))
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        let order = attach_one(&mut tx, row).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(attach_one(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM storefront.customer_order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        attach_items(&mut conn, rows).await
    }

    /// List every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&mut *conn)
        .await?;

        attach_items(&mut conn, rows).await
    }

    /// Compare-and-swap the status and payment columns.
    ///
    /// Returns `None` if the order is gone or its version moved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn update_state(
        &self,
        id: OrderId,
        expected_version: i32,
        status: OrderStatus,
        payment: &Payment,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE storefront.customer_order
            SET status = $3,
                payment_status = $4,
                payment_method = $5,
                paid_at = $6,
                transaction_id = $7,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(expected_version)
        .bind(status)
        .bind(payment.status)
        .bind(&payment.method)
        .bind(payment.paid_at)
        .bind(payment.transaction_id.as_deref())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(attach_one(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Delete an order and its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.customer_order WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl OrderStore for PgStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        OrderRepository::new(self.pool()).create(order).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(self.pool()).get_by_id(id).await
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(self.pool()).list_by_user(user_id).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(self.pool()).list_all().await
    }

    async fn update_order_state(
        &self,
        id: OrderId,
        expected_version: i32,
        status: OrderStatus,
        payment: &Payment,
    ) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(self.pool())
            .update_state(id, expected_version, status, payment)
            .await
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        OrderRepository::new(self.pool()).delete(id).await
    }
}
