//! Read-only access to the product catalog.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryProductCatalog;
pub use postgres::PostgresProductCatalog;
pub use r#trait::{ActiveProduct, CatalogError, ProductCatalog, UndecodedProduct};
