//! Catalog service: querying, administration and ratings.

use tracing::instrument;

use toyshop_core::{Caller, Page, ProductId, ProductQuery, RatingValue};

use super::CommerceError;
use crate::models::{NewProduct, Product, ProductPatch};
use crate::store::Store;

/// Catalog operations.
pub struct CatalogService<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> CatalogService<'a, S> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Filter, sort and paginate the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Internal` if storage fails.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &ProductQuery) -> Result<Page<Product>, CommerceError> {
        Ok(self.store.query_products(query).await?)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn get(&self, id: ProductId) -> Result<Product, CommerceError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Product"))
    }

    /// Add a product to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::InvalidInput` for blank fields,
    /// `CommerceError::Unauthorized` for non-administrators and
    /// `CommerceError::Conflict` if the brand and name are taken.
    #[instrument(skip(self, input), fields(user_id = %caller.user_id))]
    pub async fn create(&self, caller: &Caller, input: NewProduct) -> Result<Product, CommerceError> {
        let input = input.validated()?;
        if !caller.is_admin() {
            return Err(CommerceError::admin_only());
        }

        if self
            .store
            .find_product(&input.brand, &input.name)
            .await?
            .is_some()
        {
            return Err(duplicate());
        }

        let product = self.store.insert_product(&input).await?;
        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Patch a product.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::InvalidInput` for blank fields,
    /// `CommerceError::NotFound` if the product does not exist,
    /// `CommerceError::Unauthorized` for non-administrators and
    /// `CommerceError::Conflict` if the new brand and name are taken.
    #[instrument(skip(self, patch), fields(user_id = %caller.user_id, id = %id))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, CommerceError> {
        let patch = patch.validated()?;
        let current = self.get(id).await?;
        if !caller.is_admin() {
            return Err(CommerceError::admin_only());
        }

        if patch.renames() {
            let brand = patch.brand.as_deref().unwrap_or(&current.brand);
            let name = patch.name.as_deref().unwrap_or(&current.name);
            if let Some(existing) = self.store.find_product(brand, name).await?
                && existing.id != id
            {
                return Err(duplicate());
            }
        }

        let product = self
            .store
            .update_product(id, &patch)
            .await?
            .ok_or_else(|| CommerceError::not_found("Product"))?;
        tracing::info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Remove a product. Cart and wishlist lines for it go with it; orders
    /// keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the product does not exist and
    /// `CommerceError::Unauthorized` for non-administrators.
    #[instrument(skip(self), fields(user_id = %caller.user_id, id = %id))]
    pub async fn delete(&self, caller: &Caller, id: ProductId) -> Result<(), CommerceError> {
        self.get(id).await?;
        if !caller.is_admin() {
            return Err(CommerceError::admin_only());
        }

        if !self.store.delete_product(id).await? {
            return Err(CommerceError::not_found("Product"));
        }
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Record one rating and return the product with its new aggregate.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(user_id = %caller.user_id, id = %id))]
    pub async fn rate(
        &self,
        caller: &Caller,
        id: ProductId,
        value: RatingValue,
    ) -> Result<Product, CommerceError> {
        let product = self
            .store
            .record_rating(id, value)
            .await?
            .ok_or_else(|| CommerceError::not_found("Product"))?;
        tracing::debug!(
            product_id = %id,
            rating = %product.rating,
            num_reviews = product.num_reviews,
            "Rating recorded"
        );
        Ok(product)
    }
}

fn duplicate() -> CommerceError {
    CommerceError::Conflict("A product with this brand and name already exists".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use toyshop_core::{Price, UserId};

    use super::*;
    use crate::store::MemoryStore;

    fn admin() -> Caller {
        Caller::admin(UserId::new(1))
    }

    fn robot() -> NewProduct {
        NewProduct {
            name: "Robot".to_string(),
            brand: "Tinker".to_string(),
            category: "Electronics".to_string(),
            description: "Walks and talks".to_string(),
            price: Price::new(Decimal::new(2999, 2)).unwrap(),
            count_in_stock: 4,
            images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_requires_admin() {
        let store = MemoryStore::new();
        let err = CatalogService::new(&store)
            .create(&Caller::customer(UserId::new(2)), robot())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);
        catalog.create(&admin(), robot()).await.unwrap();
        let err = catalog.create(&admin(), robot()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found_before_auth() {
        let store = MemoryStore::new();
        let err = CatalogService::new(&store)
            .update(
                &Caller::customer(UserId::new(2)),
                ProductId::new(99),
                ProductPatch::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_never_touches_rating() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);
        let product = catalog.create(&admin(), robot()).await.unwrap();
        catalog
            .rate(&admin(), product.id, RatingValue::new(Decimal::from(4)).unwrap())
            .await
            .unwrap();

        let patch = ProductPatch {
            count_in_stock: Some(0),
            ..ProductPatch::default()
        };
        let updated = catalog.update(&admin(), product.id, patch).await.unwrap();
        assert_eq!(updated.num_reviews, 1);
        assert_eq!(updated.rating, Decimal::from(4));
        assert_eq!(updated.count_in_stock, 0);
    }

    #[tokio::test]
    async fn test_rate_missing_product() {
        let store = MemoryStore::new();
        let err = CatalogService::new(&store)
            .rate(&admin(), ProductId::new(5), RatingValue::new(Decimal::ONE).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }
}
