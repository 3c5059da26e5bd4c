//! Infrastructure layer: ledger and catalog adapters, reconstruction engines, the
//! `StockService` facade and configuration.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod service;


pub use catalog::{
    ActiveProduct, CatalogError, InMemoryProductCatalog, PostgresProductCatalog, ProductCatalog, UndecodedProduct,
};
pub use config::{ConfigError, StockConfig};
pub use engine::{ProductScope, ProductSelector, StockComputation};
pub use ledger::{InMemoryLedgerStore, LedgerError, LedgerStore, PostgresLedgerStore, SortOrder, TimeRange};
pub use service::{StockPoint, StockService};
