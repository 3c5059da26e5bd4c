//! `stockledger-core` — shared building blocks for stock reconstruction.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{ErrorKind, StockError, StockResult};
pub use id::{MovementId, ProductId};
