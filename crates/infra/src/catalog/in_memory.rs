use std::collections::BTreeMap;
use std::sync::RwLock;

use stockledger_core::{Entity, ProductId};
use stockledger_products::{Product, ProductFilter};

use super::r#trait::{ActiveProduct, CatalogError, ProductCatalog};

/// In-memory catalog keyed by product id.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<BTreeMap<ProductId, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id(), p)).collect();
        Self {
            products: RwLock::new(products),
        }
    }

    /// Insert or replace a product (test/dev helper; the real write path is external).
    pub fn upsert(&self, product: Product) -> Result<(), CatalogError> {
        let mut guard = self
            .products
            .write()
            .map_err(|_| CatalogError::Unavailable("lock poisoned".to_string()))?;
        guard.insert(product.id(), product);
        Ok(())
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        let guard = self
            .products
            .read()
            .map_err(|_| CatalogError::Unavailable("lock poisoned".to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    fn get_active_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ActiveProduct>, CatalogError> {
        let guard = self
            .products
            .read()
            .map_err(|_| CatalogError::Unavailable("lock poisoned".to_string()))?;

        let matching = guard.values().filter(|p| filter.matches(p)).cloned().map(Ok);
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(id: i64, code: &str, active: bool) -> Product {
        Product::new(ProductId::new(id), code, format!("Product {code}"), active, dec!(0), dec!(1)).unwrap()
    }

    #[test]
    fn active_products_are_ordered_filtered_and_limited() {
        let catalog = InMemoryProductCatalog::with_products(vec![
            product(3, "GEN-3", true),
            product(1, "GEN-1", true),
            product(2, "GEN-2", false),
            product(4, "TOOL-4", true),
        ]);

        let all: Vec<i64> = catalog
            .get_active_products(&ProductFilter::default())
            .unwrap()
            .into_iter()
            .map(|p| p.unwrap().id_typed().get())
            .collect();
        assert_eq!(all, vec![1, 3, 4]);

        let generators = catalog
            .get_active_products(&ProductFilter::default().with_code_prefix("gen").with_limit(1))
            .unwrap();
        assert_eq!(generators.len(), 1);
        assert_eq!(generators[0].as_ref().unwrap().id_typed().get(), 1);
    }

    #[test]
    fn upsert_replaces_and_reports_poisoned_lock() {
        let catalog = InMemoryProductCatalog::with_products(vec![product(1, "OLD", true)]);
        catalog.upsert(product(1, "NEW", true)).unwrap();
        assert_eq!(catalog.get_product(ProductId::new(1)).unwrap().unwrap().code(), "NEW");

        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = catalog.products.write().unwrap();
            panic!("poison the catalog lock");
        }));
        assert!(poisoned.is_err());
        assert!(matches!(
            catalog.upsert(product(2, "GEN-2", true)),
            Err(CatalogError::Unavailable(_))
        ));
    }

    #[test]
    fn unknown_product_is_none() {
        let catalog = InMemoryProductCatalog::new();
        assert!(catalog.get_product(ProductId::new(1)).unwrap().is_none());
    }
}
