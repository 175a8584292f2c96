//! Catalog product models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use toyshop_core::{Price, ProductId, RatingSummary};

/// Errors produced when validating product input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    /// A required text field is blank.
    #[error("product {0} cannot be blank")]
    Blank(&'static str),
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub description: String,
    pub price: Price,
    pub count_in_stock: u32,
    pub images: Vec<String>,
    /// Mean of all submitted ratings.
    pub rating: Decimal,
    pub num_reviews: u32,
    /// Running sum of submitted ratings, kept so `rating` stays exact.
    #[serde(skip)]
    pub rating_sum: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Current rating aggregate.
    #[must_use]
    pub const fn rating_summary(&self) -> RatingSummary {
        RatingSummary {
            rating: self.rating,
            num_reviews: self.num_reviews,
            sum: self.rating_sum,
        }
    }

    /// Replace the rating aggregate.
    pub const fn set_rating_summary(&mut self, summary: RatingSummary) {
        self.rating = summary.rating;
        self.num_reviews = summary.num_reviews;
        self.rating_sum = summary.sum;
    }

    /// Whether any stock is left.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.count_in_stock > 0
    }

    /// Compact view used when enriching carts, wishlists and orders.
    #[must_use]
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            brand: self.brand.clone(),
            price: self.price,
            images: self.images.clone(),
            count_in_stock: self.count_in_stock,
        }
    }
}

/// The live product fields shown next to a cart, wishlist or order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub price: Price,
    pub images: Vec<String>,
    pub count_in_stock: u32,
}

/// Fields for a new catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub brand: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub count_in_stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewProduct {
    /// Trim text fields and reject blank name, brand or category.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::Blank` naming the first blank field.
    pub fn validated(self) -> Result<Self, ProductError> {
        Ok(Self {
            name: required("name", &self.name)?,
            brand: required("brand", &self.brand)?,
            category: required("category", &self.category)?,
            description: self.description.trim().to_owned(),
            images: clean_images(self.images),
            ..self
        })
    }
}

/// Partial update of a product. Rating fields are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub count_in_stock: Option<u32>,
    pub images: Option<Vec<String>>,
}

impl ProductPatch {
    /// Trim supplied text fields and reject blank name, brand or category.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::Blank` naming the first blank field.
    pub fn validated(self) -> Result<Self, ProductError> {
        Ok(Self {
            name: self.name.map(|v| required("name", &v)).transpose()?,
            brand: self.brand.map(|v| required("brand", &v)).transpose()?,
            category: self
                .category
                .map(|v| required("category", &v))
                .transpose()?,
            description: self.description.map(|v| v.trim().to_owned()),
            images: self.images.map(clean_images),
            ..self
        })
    }

    /// Whether the patch changes the brand+name identity of a product.
    #[must_use]
    pub const fn renames(&self) -> bool {
        self.name.is_some() || self.brand.is_some()
    }

    /// Apply the patch to `product`, stamping `now` as the update time.
    #[must_use]
    pub fn apply_to(&self, mut product: Product, now: DateTime<Utc>) -> Product {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(brand) = &self.brand {
            product.brand.clone_from(brand);
        }
        if let Some(category) = &self.category {
            product.category.clone_from(category);
        }
        if let Some(description) = &self.description {
            product.description.clone_from(description);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(count) = self.count_in_stock {
            product.count_in_stock = count;
        }
        if let Some(images) = &self.images {
            product.images.clone_from(images);
        }
        product.updated_at = now;
        product
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ProductError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProductError::Blank(field));
    }
    Ok(trimmed.to_owned())
}

fn clean_images(images: Vec<String>) -> Vec<String> {
    images
        .into_iter()
        .map(|image| image.trim().to_owned())
        .filter(|image| !image.is_empty())
        .collect()
}
