use chrono::{DateTime, Duration, Utc};

use stockledger_core::{ProductId, StockError};
use stockledger_inventory::{MovementSummary, PeriodStock, SummaryBuilder};

use super::forward::ForwardReplayEngine;
use crate::ledger::{LedgerStore, SortOrder, TimeRange};

/// Builds period reports over `[start, end]` for one or more products.
///
/// Opening and closing stock come from forward replay at `start` and `end`, both
/// inclusive. The stock just before `start` is reported too, as the figure the period
/// totals reconcile against. Range and product-existence checks are the caller's job.
#[derive(Debug, Clone)]
pub struct MovementSummaryService<L> {
    ledger: L,
}

impl<L> MovementSummaryService<L>
where
    L: LedgerStore,
{
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn summarize(
        &self,
        product_ids: &[ProductId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MovementSummary, StockError> {
        let forward = ForwardReplayEngine::new(&self.ledger);
        let mut builder = SummaryBuilder::new(start, end);
        let before_start = start.checked_sub_signed(Duration::nanoseconds(1)).unwrap_or(start);

        let mut seen = std::collections::HashSet::with_capacity(product_ids.len());
        for &product_id in product_ids {
            if !seen.insert(product_id) {
                continue;
            }

            let stock = PeriodStock {
                before_start: forward.compute(product_id, before_start)?.quantity,
                at_start: forward.compute(product_id, start)?.quantity,
                at_end: forward.compute(product_id, end)?.quantity,
            };
            let records = self
                .ledger
                .query_movements(product_id, TimeRange::closed(start, end), SortOrder::Ascending)?;

            builder.add_product(product_id, stock, records);
        }

        let summary = builder.finish();
        tracing::debug!(
            products = summary.products.len(),
            movements = summary.movements.len(),
            checkpoints = summary.checkpoints.len(),
            "movement summary built"
        );
        Ok(summary)
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

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn opening_stock_includes_movements_at_start() {
        let p = ProductId::new(1);
        let ledger = InMemoryLedgerStore::with_movements(vec![
            Movement::entry(MovementId::new(1), p, day(1), dec!(10)).unwrap(),
            Movement::entry(MovementId::new(2), p, day(3), dec!(5)).unwrap(),
            Movement::exit(MovementId::new(3), p, day(4), dec!(2)).unwrap(),
        ])
        .unwrap();

        let summary = MovementSummaryService::new(&ledger).summarize(&[p, p], day(3), day(4)).unwrap();
        assert_eq!(summary.products.len(), 1);
        assert_eq!(summary.stock_before_start, dec!(10));
        assert_eq!(summary.stock_at_start, dec!(15));
        assert_eq!(summary.stock_at_end, dec!(13));
        assert_eq!(summary.totals.net, dec!(3));
        assert_eq!(summary.stock_before_start + summary.totals.net, summary.stock_at_end);
        assert_eq!(summary.movements.len(), 2);
    }
}
