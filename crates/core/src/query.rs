//! Catalog query model.
//!
//! A [`ProductQuery`] is the validated form of a catalog search: optional
//! filters combined by conjunction, one sort key from a fixed allow-list and
//! a page window. Every backend must order results by the sort key and then by
//! product ID ascending so that the same query over the same data always
//! returns the same page.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors produced when validating query parameters.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A page parameter was zero or negative.
    #[error("{0} must be a positive integer")]
    NotPositive(&'static str),
    /// Page size above the configured cap.
    #[error("page size must be at most {max}")]
    PageSizeTooLarge {
        /// Configured cap.
        max: u32,
    },
    /// Sort field outside the allow-list.
    #[error("cannot sort by '{0}' (allowed: createdAt, price, rating, name)")]
    UnknownSortField(String),
    /// Sort direction other than asc/desc.
    #[error("sort order must be 'asc' or 'desc' (got '{0}')")]
    UnknownSortOrder(String),
}

/// Sortable product fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Creation time.
    #[default]
    CreatedAt,
    /// Unit price.
    Price,
    /// Aggregate rating.
    Rating,
    /// Product name.
    Name,
}

impl std::str::FromStr for SortField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "price" => Ok(Self::Price),
            "rating" => Ok(Self::Rating),
            "name" => Ok(Self::Name),
            other => Err(QueryError::UnknownSortField(other.to_owned())),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(QueryError::UnknownSortOrder(other.to_owned())),
        }
    }
}

/// A validated 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    page: u32,
    page_size: u32,
}

impl Pagination {
    /// Page used when none is requested.
    pub const DEFAULT_PAGE: u32 = 1;
    /// Page size used when none is requested.
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    /// Validate a raw page window.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::NotPositive` for zero/negative values and
    /// `QueryError::PageSizeTooLarge` above `max_page_size`.
    pub fn new(page: i64, page_size: i64, max_page_size: u32) -> Result<Self, QueryError> {
        let page = u32::try_from(page)
            .ok()
            .filter(|p| *p > 0)
            .ok_or(QueryError::NotPositive("page"))?;
        if page_size <= 0 {
            return Err(QueryError::NotPositive("page size"));
        }
        let page_size = u32::try_from(page_size)
            .ok()
            .filter(|s| *s <= max_page_size)
            .ok_or(QueryError::PageSizeTooLarge { max: max_page_size })?;
        Ok(Self { page, page_size })
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items skipped before this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    /// Number of pages needed for `total` items: `ceil(total / page_size)`.
    #[must_use]
    pub const fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size as u64)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// A validated catalog search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    /// Case-insensitive substring matched against name or description.
    pub keyword: Option<String>,
    /// Exact brand.
    pub brand: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    /// Inclusive lower price bound.
    pub min_price: Option<Decimal>,
    /// Inclusive upper price bound.
    pub max_price: Option<Decimal>,
    /// Inclusive lower rating bound.
    pub min_rating: Option<Decimal>,
    /// Only products with stock > 0.
    pub in_stock_only: bool,
    /// Primary sort key.
    pub sort: SortField,
    /// Primary sort direction.
    pub order: SortOrder,
    /// Page window.
    pub pagination: Pagination,
}

impl ProductQuery {
    /// Drop blank text filters so `?brand=` means "any brand".
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.keyword = non_blank(self.keyword);
        self.brand = non_blank(self.brand);
        self.category = non_blank(self.category);
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total matching items across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Total number of pages.
    pub pages: u64,
}

impl<T> Page<T> {
    /// Assemble a page from its items and the total match count.
    #[must_use]
    pub const fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page(),
            page_size: pagination.page_size(),
            pages: pagination.page_count(total),
        }
    }

    /// Convert every item, keeping the page metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_rounds_up() {
        let pagination = Pagination::new(1, 10, 100).unwrap();
        assert_eq!(pagination.page_count(23), 3);
        assert_eq!(pagination.page_count(20), 2);
        assert_eq!(pagination.page_count(0), 0);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::new(3, 10, 100).unwrap().offset(), 20);
        assert_eq!(Pagination::default().offset(), 0);
    }

    #[test]
    fn test_rejects_non_positive() {
        assert_eq!(
            Pagination::new(0, 10, 100),
            Err(QueryError::NotPositive("page"))
        );
        assert_eq!(
            Pagination::new(1, -1, 100),
            Err(QueryError::NotPositive("page size"))
        );
    }

    #[test]
    fn test_rejects_page_size_above_cap() {
        assert_eq!(
            Pagination::new(1, 101, 100),
            Err(QueryError::PageSizeTooLarge { max: 100 })
        );
    }

    #[test]
    fn test_sort_allow_list() {
        assert_eq!("createdAt".parse::<SortField>().unwrap(), SortField::CreatedAt);
        assert_eq!("price".parse::<SortField>().unwrap(), SortField::Price);
        assert!(matches!(
            "password".parse::<SortField>(),
            Err(QueryError::UnknownSortField(_))
        ));
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_defaults() {
        let query = ProductQuery::default();
        assert_eq!(query.sort, SortField::CreatedAt);
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!(query.pagination.page(), 1);
        assert_eq!(query.pagination.page_size(), 10);
    }

    #[test]
    fn test_normalized_drops_blank_filters() {
        let query = ProductQuery {
            keyword: Some("  ".to_string()),
            brand: Some(" Lego ".to_string()),
            ..ProductQuery::default()
        }
        .normalized();
        assert_eq!(query.keyword, None);
        assert_eq!(query.brand.as_deref(), Some("Lego"));
    }
}
