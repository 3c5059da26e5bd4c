//! Stateless reconstruction engines over a [`LedgerStore`](crate::ledger::LedgerStore).
//!
//! Each engine is a thin struct around a borrowed or shared store and is cheap to build
//! per call.

pub mod backward;
pub mod checkpoint_locator;
pub mod forward;
pub mod summary;
pub mod validation;

pub use backward::BackwardReplayEngine;
pub use checkpoint_locator::CheckpointLocator;
pub use forward::{ForwardReplayEngine, StockComputation};
pub use summary::MovementSummaryService;
pub use validation::{ProductScope, ProductSelector, ValidationEngine};
