//! Wishlist repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use toyshop_core::{ProductId, UserId, WishlistId};

use super::{MISSING_PRODUCT, PgStore, RepositoryError};
use crate::models::Wishlist;
use crate::store::WishlistStore;

#[derive(Debug, sqlx::FromRow)]
struct WishlistRow {
    id: i32,
    user_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Upsert the user's wishlist and lock its row for the rest of the transaction.
async fn get_or_create(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<WishlistRow, RepositoryError> {
    let row = sqlx::query_as::<_, WishlistRow>(
        r"
        INSERT INTO storefront.wishlist (user_id)
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

async fn assemble(
    conn: &mut PgConnection,
    wishlist: WishlistRow,
) -> Result<Wishlist, RepositoryError> {
    let products: Vec<i32> = sqlx::query_scalar(
        "SELECT product_id FROM storefront.wishlist_item WHERE wishlist_id = $1 ORDER BY id",
    )
    .bind(wishlist.id)
    .fetch_all(conn)
    .await?;

    Ok(Wishlist {
        id: WishlistId::new(wishlist.id),
        user_id: UserId::new(wishlist.user_id),
        products: products.into_iter().map(ProductId::new).collect(),
        created_at: wishlist.created_at,
        updated_at: wishlist.updated_at,
    })
}

/// Repository for wishlist database operations.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's wishlist, if one was ever created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Wishlist>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, WishlistRow>(
            "SELECT id, user_id, created_at, updated_at FROM storefront.wishlist WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(assemble(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Add a product; adding it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product was deleted
    /// concurrently and `RepositoryError::Database` if a query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Wishlist, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let wishlist = get_or_create(&mut tx, user_id).await?;

        sqlx::query(
            r"
            INSERT INTO storefront.wishlist_item (wishlist_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (wishlist_id, product_id) DO NOTHING
            ",
        )
        .bind(wishlist.id)
        .bind(product_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_foreign_key(e, MISSING_PRODUCT))?;

        let wishlist = assemble(&mut tx, wishlist).await?;
        tx.commit().await?;
        Ok(wishlist)
    }

    /// Remove a product; removing an absent product is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Wishlist, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let wishlist = get_or_create(&mut tx, user_id).await?;

        sqlx::query("DELETE FROM storefront.wishlist_item WHERE wishlist_id = $1 AND product_id = $2")
            .bind(wishlist.id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let wishlist = assemble(&mut tx, wishlist).await?;
        tx.commit().await?;
        Ok(wishlist)
    }

    /// Remove every product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<Wishlist, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let wishlist = get_or_create(&mut tx, user_id).await?;

        sqlx::query("DELETE FROM storefront.wishlist_item WHERE wishlist_id = $1")
            .bind(wishlist.id)
            .execute(&mut *tx)
            .await?;

        let wishlist = assemble(&mut tx, wishlist).await?;
        tx.commit().await?;
        Ok(wishlist)
    }
}

impl WishlistStore for PgStore {
    async fn get_wishlist(&self, user_id: UserId) -> Result<Option<Wishlist>, RepositoryError> {
        WishlistRepository::new(self.pool()).get_by_user(user_id).await
    }

    async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Wishlist, RepositoryError> {
        WishlistRepository::new(self.pool())
            .add(user_id, product_id)
            .await
    }

    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Wishlist, RepositoryError> {
        WishlistRepository::new(self.pool())
            .remove(user_id, product_id)
            .await
    }

    async fn clear_wishlist(&self, user_id: UserId) -> Result<Wishlist, RepositoryError> {
        WishlistRepository::new(self.pool()).clear(user_id).await
    }
}
