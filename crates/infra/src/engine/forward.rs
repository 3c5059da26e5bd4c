use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{MovementId, ProductId, StockError};
use stockledger_inventory::{Baseline, ReplayOutcome, replay_forward};

use super::checkpoint_locator::CheckpointLocator;
use crate::ledger::{LedgerStore, SortOrder, TimeRange};

/// A point-in-time stock figure with the data it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockComputation {
    pub product_id: ProductId,
    pub at: DateTime<Utc>,
    pub quantity: Decimal,
    pub baseline: Baseline,
    pub applied: usize,
    pub unclassified: usize,
    pub last_movement: Option<MovementId>,
}

/// Reconstructs stock by folding movements forward from the governing checkpoint.
#[derive(Debug, Clone)]
pub struct ForwardReplayEngine<L> {
    ledger: L,
}

impl<L> ForwardReplayEngine<L>
where
    L: LedgerStore,
{
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Stock of `product_id` as of `target` (inclusive).
    pub fn compute(
        &self,
        product_id: ProductId,
        target: DateTime<Utc>,
    ) -> Result<StockComputation, StockError> {
        let baseline = CheckpointLocator::new(&self.ledger).locate(product_id, target)?;
        let outcome = self.replay_from(product_id, &baseline, target)?;

        Ok(StockComputation {
            product_id,
            at: target,
            quantity: outcome.quantity,
            baseline,
            applied: outcome.applied,
            unclassified: outcome.unclassified,
            last_movement: outcome.last_movement,
        })
    }

    /// Fold the movements in `(baseline checkpoint, target]` onto `baseline`.
    pub fn replay_from(
        &self,
        product_id: ProductId,
        baseline: &Baseline,
        target: DateTime<Utc>,
    ) -> Result<ReplayOutcome, StockError> {
        let window = TimeRange::replay_window(baseline.checkpoint_at(), target);
        let movements = if window.is_empty() {
            Vec::new()
        } else {
            self.ledger.query_movements(product_id, window, SortOrder::Ascending)?
        };

        let outcome = replay_forward(product_id, baseline, &movements)?;

        if outcome.unclassified > 0 {
            tracing::warn!(
                %product_id,
                unclassified = outcome.unclassified,
                "skipped movements with unknown kind during replay"
            );
        }
        tracing::debug!(
            %product_id,
            %target,
            applied = outcome.applied,
            quantity = %outcome.quantity,
            "forward replay complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use stockledger_inventory::{Movement, MovementKind};

    use crate::ledger::InMemoryLedgerStore;

    const P: ProductId = ProductId::new(1);

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn movements_at_the_checkpoint_instant_are_superseded() {
        let ledger = InMemoryLedgerStore::with_movements(vec![
            Movement::entry(MovementId::new(1), P, day(5), dec!(7)).unwrap(),
            Movement::checkpoint(MovementId::new(2), P, day(5), dec!(40)).unwrap(),
            Movement::entry(MovementId::new(3), P, day(5), dec!(9)).unwrap(),
            Movement::exit(MovementId::new(4), P, day(6), dec!(10)).unwrap(),
        ])
        .unwrap();

        let engine = ForwardReplayEngine::new(&ledger);
        assert_eq!(engine.compute(P, day(5)).unwrap().quantity, dec!(40));

        let later = engine.compute(P, day(6)).unwrap();
        assert_eq!(later.quantity, dec!(30));
        assert_eq!(later.applied, 1);
        assert_eq!(later.last_movement, Some(MovementId::new(4)));
    }

    #[test]
    fn reports_unclassified_count() {
        let ledger = InMemoryLedgerStore::with_movements(vec![
            Movement::entry(MovementId::new(1), P, day(1), dec!(10)).unwrap(),
            Movement::new(MovementId::new(2), P, day(2), MovementKind::Unclassified, dec!(99)).unwrap(),
        ])
        .unwrap();

        let out = ForwardReplayEngine::new(&ledger).compute(P, day(3)).unwrap();
        assert_eq!(out.quantity, dec!(10));
        assert_eq!(out.unclassified, 1);
        assert!(out.baseline.checkpoint().is_none());
    }
}
