//! Seed the catalog with products from a YAML file.
//!
//! # Usage
//!
//! ```bash
//! toyshop-cli seed products data/products.yaml
//! ```
//!
//! The file is a list of products:
//!
//! ```yaml
//! - name: Wooden Train Set
//!   brand: Brio
//!   category: Wooden Toys
//!   description: Forty-piece figure-eight set
//!   price: "49.99"
//!   countInStock: 12
//!   images: [/images/train.jpg]
//! ```
//!
//! Products whose brand and name already exist are skipped, so the command
//! can be re-run safely.

use std::path::Path;

use thiserror::Error;
use tracing::{error, info};

use toyshop_storefront::db::{self, PgStore, RepositoryError};
use toyshop_storefront::models::{NewProduct, ProductError};
use toyshop_storefront::store::CatalogStore;

use super::{CommandError, database_url};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Product #{index} is invalid: {source}")]
    InvalidProduct {
        index: usize,
        source: ProductError,
    },

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Parse and validate a YAML product list. Indices in errors are 1-based.
fn parse_products(yaml: &str) -> Result<Vec<NewProduct>, SeedError> {
    let products: Vec<NewProduct> = serde_yaml::from_str(yaml)?;
    products
        .into_iter()
        .enumerate()
        .map(|(i, product)| {
            product
                .validated()
                .map_err(|source| SeedError::InvalidProduct {
                    index: i + 1,
                    source,
                })
        })
        .collect()
}

/// Insert every product not already in the catalog.
async fn seed<S: CatalogStore>(
    store: &S,
    products: &[NewProduct],
) -> Result<SeedSummary, RepositoryError> {
    let mut summary = SeedSummary::default();
    for product in products {
        if store
            .find_product(&product.brand, &product.name)
            .await?
            .is_some()
        {
            info!(brand = %product.brand, name = %product.name, "Skipping existing product");
            summary.skipped += 1;
            continue;
        }

        match store.insert_product(product).await {
            Ok(created) => {
                info!(id = %created.id, name = %created.name, "Inserted product");
                summary.inserted += 1;
            }
            // Inserted concurrently by someone else
            Err(RepositoryError::Conflict(_)) => summary.skipped += 1,
            Err(e) => return Err(e),
        }
    }
    Ok(summary)
}

/// Seed products from a YAML file.
///
/// # Errors
///
/// Returns `SeedError` if the file cannot be read or parsed, a product is
/// invalid, or a database operation fails.
pub async fn products(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    let yaml = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: file_path.to_owned(),
        source,
    })?;
    let products = parse_products(&yaml)?;
    info!("Loaded {} products from {}", products.len(), file_path);

    let database_url = database_url()?;
    let pool = db::create_pool(&database_url)
        .await
        .map_err(CommandError::from)?;
    info!("Connected to database");

    let summary = seed(&PgStore::new(pool), &products).await.inspect_err(|e| {
        error!("Seeding stopped: {e}");
    })?;

    info!("Seeding complete!");
    info!("  Products inserted: {}", summary.inserted);
    info!("  Products skipped (already exist): {}", summary.skipped);
    Ok(())
}
