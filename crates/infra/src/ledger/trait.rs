use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockledger_core::{ProductId, StockError};
use stockledger_inventory::Movement;

use super::query::{SortOrder, TimeRange};

/// Ledger read error.
///
/// These are **infrastructure errors** (storage, decoding) as opposed to domain errors.
/// Inside the engines they surface as [`StockError::Computation`].
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger backend unavailable: {0}")]
    Unavailable(String),

    #[error("ledger query failed: {0}")]
    Query(String),

    #[error("failed to decode ledger row: {0}")]
    Decode(String),

    #[error("invalid ledger append: {0}")]
    InvalidAppend(String),
}

impl From<LedgerError> for StockError {
    fn from(err: LedgerError) -> Self {
        StockError::computation(err.to_string())
    }
}

/// Read side of the append-only movement ledger.
///
/// ## Ordering
///
/// Every read is totally ordered by `(timestamp, id)` in the requested direction. This is a
/// correctness requirement of replay, not an optimization: implementations must sort on
/// both keys (a database index on `(product_id, occurred_at, id)` serves both).
///
/// ## Checkpoints
///
/// Checkpoint records (document reference `"000000"`) are returned by
/// `query_movements` like any other record; callers decide what to do with them.
///
/// Implementations must be `Send + Sync`: batch validation reads from several workers at
/// once, each through its own call.
pub trait LedgerStore: Send + Sync {
    /// All records of `product_id` whose timestamp lies in `range`, sorted by
    /// `(timestamp, id)` in `order`.
    fn query_movements(
        &self,
        product_id: ProductId,
        range: TimeRange,
        order: SortOrder,
    ) -> Result<Vec<Movement>, LedgerError>;

    /// The checkpoint with the greatest `(timestamp, id)` such that timestamp ≤
    /// `at_or_before`, if any.
    fn query_latest_checkpoint(
        &self,
        product_id: ProductId,
        at_or_before: DateTime<Utc>,
    ) -> Result<Option<Movement>, LedgerError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn query_movements(
        &self,
        product_id: ProductId,
        range: TimeRange,
        order: SortOrder,
    ) -> Result<Vec<Movement>, LedgerError> {
        (**self).query_movements(product_id, range, order)
    }

    fn query_latest_checkpoint(
        &self,
        product_id: ProductId,
        at_or_before: DateTime<Utc>,
    ) -> Result<Option<Movement>, LedgerError> {
        (**self).query_latest_checkpoint(product_id, at_or_before)
    }
}

impl<S> LedgerStore for &S
where
    S: LedgerStore + ?Sized,
{
    fn query_movements(
        &self,
        product_id: ProductId,
        range: TimeRange,
        order: SortOrder,
    ) -> Result<Vec<Movement>, LedgerError> {
        (**self).query_movements(product_id, range, order)
    }

    fn query_latest_checkpoint(
        &self,
        product_id: ProductId,
        at_or_before: DateTime<Utc>,
    ) -> Result<Option<Movement>, LedgerError> {
        (**self).query_latest_checkpoint(product_id, at_or_before)
    }
}
