//! Inventory ledger domain: movements, checkpoints and point-in-time replay.
//!
//! This crate contains the stock reconstruction rules, implemented purely as
//! deterministic domain logic (no IO, no storage). Fetching ledger slices in the
//! right order is the infrastructure's job.

pub mod checkpoint;
pub mod movement;
pub mod replay;
pub mod summary;
pub mod validation;

pub use checkpoint::{Baseline, Checkpoint};
pub use movement::{
    CHECKPOINT_DOCUMENT, MAX_DOCUMENT_REFERENCE_LEN, Movement, MovementKind, sort_chronologically,
};
pub use replay::{BackwardOutcome, BackwardPolicy, ReplayOutcome, replay_backward, replay_forward};
pub use summary::{MovementSummary, MovementTotals, PeriodStock, ProductPeriod, SummaryBuilder};
pub use validation::{
    ComputedStock, DifferenceExtreme, ExtendedValidationReport, Recommendation, RecommendationKind,
    RecommendationPolicy, StockComparison, ValidationEntry, ValidationReport, ValidationStatus,
};
