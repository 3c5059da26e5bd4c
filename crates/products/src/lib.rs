//! Product catalog records (read-only view).
//!
//! The catalog is owned and mutated elsewhere; stock reconstruction only reads the
//! identity, the active flag, the unit cost and the denormalized `current_stock` figure.

pub mod product;

pub use product::{Product, ProductFilter};
