//! Read boundary over the append-only movement ledger.
//!
//! Ingestion is owned elsewhere; this module only reads ordered slices of a product's
//! records and locates checkpoints.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use query::{SortOrder, TimeRange};
pub use r#trait::{LedgerError, LedgerStore};
