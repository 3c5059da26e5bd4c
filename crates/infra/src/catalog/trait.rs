use std::sync::Arc;

use thiserror::Error;

use stockledger_core::{ProductId, StockError};
use stockledger_products::{Product, ProductFilter};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog backend unavailable: {0}")]
    Unavailable(String),

    #[error("catalog query failed: {0}")]
    Query(String),

    #[error("failed to decode catalog row: {0}")]
    Decode(String),
}

impl From<CatalogError> for StockError {
    fn from(err: CatalogError) -> Self {
        StockError::computation(err.to_string())
    }
}

/// A listed catalog row that could not be turned into a [`Product`].
#[derive(Debug)]
pub struct UndecodedProduct {
    pub id: ProductId,
    pub error: CatalogError,
}

/// One row of an active-product listing.
pub type ActiveProduct = Result<Product, UndecodedProduct>;

/// Product catalog lookups.
///
/// A missing product is `Ok(None)`, not an error; callers map it to
/// [`StockError::NotFound`] where that matters.
pub trait ProductCatalog: Send + Sync {
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError>;

    /// Active products passing `filter`, ordered by id, truncated to `filter.limit`.
    ///
    /// A row that fails to decode is returned in place as an [`UndecodedProduct`]; only a
    /// failure of the listing itself is an `Err`.
    fn get_active_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ActiveProduct>, CatalogError>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        (**self).get_product(id)
    }

    fn get_active_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ActiveProduct>, CatalogError> {
        (**self).get_active_products(filter)
    }
}

impl<C> ProductCatalog for &C
where
    C: ProductCatalog + ?Sized,
{
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        (**self).get_product(id)
    }

    fn get_active_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ActiveProduct>, CatalogError> {
        (**self).get_active_products(filter)
    }
}
