//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `product` - Catalog, with `rating_sum`/`num_reviews`/`rating` aggregates
//! - `cart`, `cart_item` - One cart per user, one line per product
//! - `wishlist`, `wishlist_item` - One wishlist per user, ordered product set
//! - `customer_order`, `order_item` - Orders and their frozen line snapshots
//! - `user` - Display data for order listings
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p toyshop-cli -- migrate
//! ```

pub mod carts;
pub mod orders;
pub mod products;
pub mod users;
pub mod wishlists;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;
pub use wishlists::WishlistRepository;

use crate::store::Store;

/// Reported when a product is deleted while a line referencing it is written.
pub(crate) const MISSING_PRODUCT: &str = "product no longer exists";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., duplicate brand and name).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The in-memory store is unusable after a panic while a lock was held.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }

    /// Map a foreign key violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_foreign_key(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_foreign_key_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `PostgreSQL`-backed [`Store`].
///
/// Cheap to clone; the pool is reference counted.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct Violation {
        code: &'static str,
    }

    impl fmt::Display for Violation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "violation {}", self.code)
        }
    }

    impl StdError for Violation {}

    impl DatabaseError for Violation {
        fn message(&self) -> &str {
            "violation"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                "23503" => ErrorKind::ForeignKeyViolation,
                "23505" => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn violation(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Violation { code }))
    }

    #[test]
    fn test_foreign_key_violation_is_conflict() {
        let err = RepositoryError::from_foreign_key(violation("23503"), MISSING_PRODUCT);
        assert!(matches!(err, RepositoryError::Conflict(ref m) if m == MISSING_PRODUCT));

        let err = RepositoryError::from_foreign_key(violation("23505"), MISSING_PRODUCT);
        assert!(matches!(err, RepositoryError::Database(_)));
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = RepositoryError::from_unique(violation("23505"), "duplicate");
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let err = RepositoryError::from_unique(violation("23503"), "duplicate");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
