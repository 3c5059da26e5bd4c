use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockledger_core::{ProductId, StockError};
use stockledger_inventory::{BackwardOutcome, BackwardPolicy, replay_backward};

use crate::ledger::{LedgerStore, SortOrder, TimeRange};

/// Reconstructs past stock by undoing movements from a trusted current figure.
#[derive(Debug, Clone)]
pub struct BackwardReplayEngine<L> {
    ledger: L,
    policy: BackwardPolicy,
}

impl<L> BackwardReplayEngine<L>
where
    L: LedgerStore,
{
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            policy: BackwardPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BackwardPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Walk from `current` (the quantity as of `as_of`) back to `target`.
    ///
    /// Only movements in `(target, as_of]` are undone; anything dated after `as_of` is
    /// assumed not to be reflected in `current` yet.
    pub fn reconstruct(
        &self,
        product_id: ProductId,
        current: Decimal,
        as_of: DateTime<Utc>,
        target: DateTime<Utc>,
    ) -> Result<BackwardOutcome, StockError> {
        if target > as_of {
            return Err(StockError::invalid_range(format!(
                "backward target {target} is after the reference instant {as_of}"
            )));
        }

        let window = TimeRange::replay_window(Some(target), as_of);
        let movements = if window.is_empty() {
            Vec::new()
        } else {
            self.ledger.query_movements(product_id, window, SortOrder::Descending)?
        };

        let outcome = replay_backward(product_id, current, target, &movements, self.policy)?;

        if let Some(barrier) = &outcome.barrier {
            tracing::debug!(
                %product_id,
                checkpoint_id = %barrier.movement_id,
                at = %barrier.at,
                "backward replay stopped at checkpoint"
            );
        }
        if outcome.unclassified > 0 {
            tracing::warn!(
                %product_id,
                unclassified = outcome.unclassified,
                "skipped movements with unknown kind during backward replay"
            );
        }
        Ok(outcome)
    }
}
