//! Pure replay folds over ordered ledger records.
//!
//! These functions do no IO. The caller fetches the records in the required order and the
//! fold verifies that order as it goes: an out-of-order or out-of-window record is a
//! computation failure, never silently folded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{MovementId, ProductId, StockError};

use crate::checkpoint::{Baseline, Checkpoint};
use crate::movement::{Movement, MovementKind};

/// Result of a forward replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub quantity: Decimal,
    /// Entries and exits folded into the quantity.
    pub applied: usize,
    /// Records skipped because their kind is unknown.
    pub unclassified: usize,
    /// Last record folded, if any.
    pub last_movement: Option<MovementId>,
}

/// Fold ordinary movements into `baseline`.
///
/// `movements` must be the product's records in `(checkpoint_at, ∞)`, ascending by
/// `(timestamp, id)`. Entries add, exits subtract, unclassified records are counted and
/// skipped. The result is never clamped: a negative quantity is a valid answer.
pub fn replay_forward<'a, I>(
    product_id: ProductId,
    baseline: &Baseline,
    movements: I,
) -> Result<ReplayOutcome, StockError>
where
    I: IntoIterator<Item = &'a Movement>,
{
    let lower = baseline.checkpoint_at();
    let mut outcome = ReplayOutcome {
        quantity: baseline.quantity(),
        applied: 0,
        unclassified: 0,
        last_movement: None,
    };
    let mut previous: Option<(DateTime<Utc>, MovementId)> = None;

    for movement in movements {
        ensure_product(product_id, movement)?;

        if let Some(prev) = previous {
            if movement.sort_key() <= prev {
                return Err(StockError::computation(format!(
                    "product {product_id}: movement {} out of ascending (timestamp, id) order",
                    movement.id_typed()
                )));
            }
        }
        previous = Some(movement.sort_key());

        if let Some(lower) = lower {
            if movement.occurred_at() <= lower {
                return Err(StockError::computation(format!(
                    "product {product_id}: movement {} is not after the governing checkpoint at {lower}",
                    movement.id_typed()
                )));
            }
        }

        if movement.is_checkpoint() {
            return Err(StockError::computation(format!(
                "product {product_id}: checkpoint {} found after the governing checkpoint",
                movement.id_typed()
            )));
        }

        match movement.signed_delta() {
            Some(delta) => {
                outcome.quantity = outcome
                    .quantity
                    .checked_add(delta)
                    .ok_or_else(|| overflow(product_id, movement))?;
                outcome.applied += 1;
                outcome.last_movement = Some(movement.id_typed());
            }
            None => outcome.unclassified += 1,
        }
    }

    Ok(outcome)
}

/// How backward replay treats a checkpoint met during the walk.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackwardPolicy {
    /// The checkpoint's quantity is exact at its instant and supersedes everything older;
    /// the walk ends there.
    #[default]
    StopAtCheckpoint,
    /// Reset the running quantity to the checkpoint's value and keep undoing older
    /// movements. Matches the legacy running-adjustment behavior; kept for comparing
    /// against historical data.
    ContinueThrough,
}

/// Result of a backward replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackwardOutcome {
    pub quantity: Decimal,
    /// Entries and exits reverted.
    pub undone: usize,
    pub unclassified: usize,
    /// Checkpoint that ended the walk under [`BackwardPolicy::StopAtCheckpoint`].
    ///
    /// When set, `quantity` is exact as of `barrier.at`; movements between the target
    /// instant and the barrier are superseded by the reset and were not reverted.
    pub barrier: Option<Checkpoint>,
    /// Checkpoints the walk reset to under [`BackwardPolicy::ContinueThrough`].
    pub checkpoints_crossed: usize,
}

impl BackwardOutcome {
    pub fn stopped_at_checkpoint(&self) -> bool {
        self.barrier.is_some()
    }
}

/// Undo movements from a trusted current quantity back to `target`.
///
/// `movements` must be the product's records with timestamp `> target`, descending by
/// `(timestamp, id)`. Undoing an entry subtracts its quantity; undoing an exit adds it.
pub fn replay_backward<'a, I>(
    product_id: ProductId,
    current: Decimal,
    target: DateTime<Utc>,
    movements: I,
    policy: BackwardPolicy,
) -> Result<BackwardOutcome, StockError>
where
    I: IntoIterator<Item = &'a Movement>,
{
    let mut outcome = BackwardOutcome {
        quantity: current,
        undone: 0,
        unclassified: 0,
        barrier: None,
        checkpoints_crossed: 0,
    };
    let mut previous: Option<(DateTime<Utc>, MovementId)> = None;

    for movement in movements {
        ensure_product(product_id, movement)?;

        if let Some(prev) = previous {
            if movement.sort_key() >= prev {
                return Err(StockError::computation(format!(
                    "product {product_id}: movement {} out of descending (timestamp, id) order",
                    movement.id_typed()
                )));
            }
        }
        previous = Some(movement.sort_key());

        if movement.occurred_at() <= target {
            return Err(StockError::computation(format!(
                "product {product_id}: movement {} is not after the target instant {target}",
                movement.id_typed()
            )));
        }

        if let Some(checkpoint) = Checkpoint::from_movement(movement) {
            outcome.quantity = checkpoint.quantity;
            match policy {
                BackwardPolicy::StopAtCheckpoint => {
                    outcome.barrier = Some(checkpoint);
                    return Ok(outcome);
                }
                BackwardPolicy::ContinueThrough => {
                    outcome.checkpoints_crossed += 1;
                    continue;
                }
            }
        }

        match movement.kind() {
            MovementKind::Entry => {
                outcome.quantity = outcome
                    .quantity
                    .checked_sub(movement.quantity())
                    .ok_or_else(|| overflow(product_id, movement))?;
                outcome.undone += 1;
            }
            MovementKind::Exit => {
                outcome.quantity = outcome
                    .quantity
                    .checked_add(movement.quantity())
                    .ok_or_else(|| overflow(product_id, movement))?;
                outcome.undone += 1;
            }
            MovementKind::Unclassified => outcome.unclassified += 1,
        }
    }

    Ok(outcome)
}

fn overflow(product_id: ProductId, movement: &Movement) -> StockError {
    StockError::computation(format!(
        "product {product_id}: stock overflows at movement {}",
        movement.id_typed()
    ))
}

fn ensure_product(product_id: ProductId, movement: &Movement) -> Result<(), StockError> {
    if movement.product_id() != product_id {
        return Err(StockError::computation(format!(
            "movement {} belongs to product {}, not {product_id}",
            movement.id_typed(),
            movement.product_id()
        )));
    }
    Ok(())
}
