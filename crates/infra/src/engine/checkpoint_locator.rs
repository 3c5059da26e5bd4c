use chrono::{DateTime, Utc};

use stockledger_core::{ProductId, StockError};
use stockledger_inventory::{Baseline, Checkpoint};

use crate::ledger::LedgerStore;

/// Finds the checkpoint governing a point-in-time computation.
#[derive(Debug, Clone)]
pub struct CheckpointLocator<L> {
    ledger: L,
}

impl<L> CheckpointLocator<L>
where
    L: LedgerStore,
{
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Baseline for `product_id` at `target`: the latest checkpoint with timestamp ≤
    /// `target` (ties broken by id), or zero when there is none.
    pub fn locate(
        &self,
        product_id: ProductId,
        target: DateTime<Utc>,
    ) -> Result<Baseline, StockError> {
        let Some(record) = self.ledger.query_latest_checkpoint(product_id, target)? else {
            tracing::debug!(%product_id, %target, "no checkpoint; replaying from zero");
            return Ok(Baseline::zero());
        };

        let checkpoint = Checkpoint::from_movement(&record).ok_or_else(|| {
            StockError::computation(format!(
                "ledger returned movement {} as a checkpoint but it is not one",
                record.id_typed()
            ))
        })?;

        if checkpoint.product_id != product_id || checkpoint.at > target {
            return Err(StockError::computation(format!(
                "ledger returned checkpoint {} outside the requested scope (product {}, at {})",
                checkpoint.movement_id, checkpoint.product_id, checkpoint.at
            )));
        }

        tracing::debug!(
            %product_id,
            checkpoint_id = %checkpoint.movement_id,
            at = %checkpoint.at,
            quantity = %checkpoint.quantity,
            "located governing checkpoint"
        );
        Ok(Baseline::from_checkpoint(checkpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use stockledger_core::MovementId;
    use stockledger_inventory::Movement;

    use crate::ledger::InMemoryLedgerStore;

    const P: ProductId = ProductId::new(1);

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn no_checkpoint_means_zero_baseline() {
        let ledger = InMemoryLedgerStore::with_movements(vec![
            Movement::entry(MovementId::new(1), P, day(2), dec!(5)).unwrap(),
        ])
        .unwrap();

        let baseline = CheckpointLocator::new(&ledger).locate(P, day(10)).unwrap();
        assert_eq!(baseline.as_pair(), (dec!(0), None));
    }

    #[test]
    fn picks_most_recent_checkpoint_at_or_before_target() {
        let ledger = InMemoryLedgerStore::with_movements(vec![
            Movement::checkpoint(MovementId::new(1), P, day(1), dec!(100)).unwrap(),
            Movement::checkpoint(MovementId::new(2), P, day(5), dec!(200)).unwrap(),
            Movement::checkpoint(MovementId::new(3), P, day(9), dec!(300)).unwrap(),
        ])
        .unwrap();
        let locator = CheckpointLocator::new(&ledger);

        assert_eq!(locator.locate(P, day(5)).unwrap().as_pair(), (dec!(200), Some(day(5))));
        assert_eq!(locator.locate(P, day(8)).unwrap().as_pair(), (dec!(200), Some(day(5))));
        assert_eq!(locator.locate(P, day(30)).unwrap().quantity(), dec!(300));
    }
}
