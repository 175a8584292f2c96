//! Cart repository for database operations.
//!
//! Each mutation runs in one transaction that starts by locking the user's
//! cart row (created on the spot where the operation allows it), so writes to
//! one cart are serialized while different users never contend.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use toyshop_core::{CartId, ProductId, Quantity, UserId};

use super::{MISSING_PRODUCT, PgStore, RepositoryError};
use crate::models::{Cart, CartLine};
use crate::store::CartStore;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i32,
    user_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    product_id: i32,
    quantity: i32,
}

impl TryFrom<CartItemRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::try_from(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid cart quantity in database: {e}"))
        })?;
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            quantity,
        })
    }
}

/// Upsert the user's cart and lock its row for the rest of the transaction.
async fn get_or_create(conn: &mut PgConnection, user_id: UserId) -> Result<CartRow, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(
        r"
        INSERT INTO storefront.cart (user_id)
        VALUES ($1)
        ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
        RETURNING id, user_id, created_at, updated_at
        ",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;

    Ok(row)
}

/// Lock an existing cart row without creating one.
async fn lock_existing(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<CartRow>, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(
        r"
        SELECT id, user_id, created_at, updated_at
        FROM storefront.cart
        WHERE user_id = $1
        FOR UPDATE
        ",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

async fn touch(conn: &mut PgConnection, cart_id: i32) -> Result<CartRow, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(
        r"
        UPDATE storefront.cart SET updated_at = NOW()
        WHERE id = $1
        RETURNING id, user_id, created_at, updated_at
        ",
    )
    .bind(cart_id)
    .fetch_one(conn)
    .await?;

    Ok(row)
}

/// Read a cart's lines in insertion order and assemble the cart.
async fn assemble(conn: &mut PgConnection, cart: CartRow) -> Result<Cart, RepositoryError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT product_id, quantity
        FROM storefront.cart_item
        WHERE cart_id = $1
        ORDER BY id
        ",
    )
    .bind(cart.id)
    .fetch_all(conn)
    .await?;

    let items = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<CartLine>, _>>()?;

    Ok(Cart {
        id: CartId::new(cart.id),
        user_id: UserId::new(cart.user_id),
        items,
        created_at: cart.created_at,
        updated_at: cart.updated_at,
    })
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's cart, if one was ever created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, created_at, updated_at FROM storefront.cart WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(assemble(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product was deleted
    /// concurrently and `RepositoryError::Database` if a query fails.
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let cart = get_or_create(&mut tx, user_id).await?;

        sqlx::query(
            r"
            INSERT INTO storefront.cart_item (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = storefront.cart_item.quantity + EXCLUDED.quantity
            ",
        )
        .bind(cart.id)
        .bind(product_id)
        .bind(i32::from(quantity))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_foreign_key(e, MISSING_PRODUCT))?;

        let cart = assemble(&mut tx, cart).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Overwrite a line's quantity.
    ///
    /// Returns `None` if the user has no cart or the cart has no such line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Option<Cart>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(cart) = lock_existing(&mut tx, user_id).await? else {
            return Ok(None);
        };

        let result = sqlx::query(
            "UPDATE storefront.cart_item SET quantity = $3 WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart.id)
        .bind(product_id)
        .bind(i32::from(quantity))
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let cart = touch(&mut tx, cart.id).await?;
        let cart = assemble(&mut tx, cart).await?;
        tx.commit().await?;
        Ok(Some(cart))
    }

    /// Remove a line.
    ///
    /// Returns `None` if the user has no cart or the cart has no such line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Cart>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(cart) = lock_existing(&mut tx, user_id).await? else {
            return Ok(None);
        };

        let result =
            sqlx::query("DELETE FROM storefront.cart_item WHERE cart_id = $1 AND product_id = $2")
                .bind(cart.id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let cart = touch(&mut tx, cart.id).await?;
        let cart = assemble(&mut tx, cart).await?;
        tx.commit().await?;
        Ok(Some(cart))
    }

    /// Empty the cart, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let cart = get_or_create(&mut tx, user_id).await?;

        sqlx::query("DELETE FROM storefront.cart_item WHERE cart_id = $1")
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;

        let cart = assemble(&mut tx, cart).await?;
        tx.commit().await?;
        Ok(cart)
    }
}

impl CartStore for PgStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        CartRepository::new(self.pool()).get_by_user(user_id).await
    }

    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Cart, RepositoryError> {
        CartRepository::new(self.pool())
            .add_item(user_id, product_id, quantity)
            .await
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Option<Cart>, RepositoryError> {
        CartRepository::new(self.pool())
            .set_quantity(user_id, product_id, quantity)
            .await
    }

    async fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Cart>, RepositoryError> {
        CartRepository::new(self.pool())
            .remove_item(user_id, product_id)
            .await
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        CartRepository::new(self.pool()).clear(user_id).await
    }
}
