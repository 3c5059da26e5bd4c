//! Period movement summaries for audit trails and reporting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::ProductId;

use crate::checkpoint::Checkpoint;
use crate::movement::{Movement, MovementKind, sort_chronologically};

/// Quantity and value totals over a set of ordinary movements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementTotals {
    pub entries: Decimal,
    pub exits: Decimal,
    /// `entries - exits`.
    pub net: Decimal,
    pub entry_value: Decimal,
    pub exit_value: Decimal,
    pub entry_count: usize,
    pub exit_count: usize,
    pub unclassified_count: usize,
}

impl MovementTotals {
    /// Account for one ordinary movement. Checkpoints are not movements and are ignored.
    pub fn record(&mut self, movement: &Movement) {
        if movement.is_checkpoint() {
            return;
        }
        match movement.kind() {
            MovementKind::Entry => {
                self.entries = self.entries.saturating_add(movement.quantity());
                self.entry_value = self.entry_value.saturating_add(movement.total_value());
                self.entry_count += 1;
            }
            MovementKind::Exit => {
                self.exits = self.exits.saturating_add(movement.quantity());
                self.exit_value = self.exit_value.saturating_add(movement.total_value());
                self.exit_count += 1;
            }
            MovementKind::Unclassified => self.unclassified_count += 1,
        }
        self.net = self.entries.saturating_sub(self.exits);
    }

    pub fn merge(&mut self, other: &MovementTotals) {
        self.entries = self.entries.saturating_add(other.entries);
        self.exits = self.exits.saturating_add(other.exits);
        self.entry_value = self.entry_value.saturating_add(other.entry_value);
        self.exit_value = self.exit_value.saturating_add(other.exit_value);
        self.entry_count += other.entry_count;
        self.exit_count += other.exit_count;
        self.unclassified_count += other.unclassified_count;
        self.net = self.entries.saturating_sub(self.exits);
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0 && self.exit_count == 0 && self.unclassified_count == 0
    }
}

/// Replayed stock of one product around a period's bounds.
///
/// `at_start` already includes records timestamped exactly at `start`, which the period
/// totals count as well. `before_start` excludes them, so when no checkpoint falls inside
/// the period `before_start + totals.net == at_end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStock {
    pub before_start: Decimal,
    pub at_start: Decimal,
    pub at_end: Decimal,
}

/// Opening/closing stock and totals of one product over the period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPeriod {
    pub product_id: ProductId,
    /// Stock strictly before `start`; reconciles with `totals.net`.
    pub stock_before_start: Decimal,
    /// Stock at `start`, inclusive.
    pub stock_at_start: Decimal,
    pub stock_at_end: Decimal,
    pub totals: MovementTotals,
    pub checkpoint_count: usize,
}

/// Movement activity of one or more products over a closed range `[start, end]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Checkpoints inside the range, chronological.
    pub checkpoints: Vec<Checkpoint>,
    /// Ordinary movements inside the range, chronological across all products.
    pub movements: Vec<Movement>,
    pub totals: MovementTotals,
    /// Sum of every product's stock strictly before `start`.
    pub stock_before_start: Decimal,
    /// Sum of every product's stock at `start`, inclusive.
    pub stock_at_start: Decimal,
    /// Sum of every product's stock at `end`.
    pub stock_at_end: Decimal,
    pub products: Vec<ProductPeriod>,
}

impl MovementSummary {
    pub fn product(&self, product_id: ProductId) -> Option<&ProductPeriod> {
        self.products.iter().find(|p| p.product_id == product_id)
    }

    pub fn has_activity(&self) -> bool {
        !self.movements.is_empty() || !self.checkpoints.is_empty()
    }
}

/// Accumulates per-product ledger slices into a [`MovementSummary`].
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    checkpoints: Vec<Checkpoint>,
    movements: Vec<Movement>,
    products: Vec<ProductPeriod>,
}

impl SummaryBuilder {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            checkpoints: Vec::new(),
            movements: Vec::new(),
            products: Vec::new(),
        }
    }

    /// Add one product's records for the period.
    ///
    /// Records outside `[start, end]` are dropped so a caller may pass a wider slice.
    pub fn add_product(
        &mut self,
        product_id: ProductId,
        stock: PeriodStock,
        records: impl IntoIterator<Item = Movement>,
    ) -> &mut Self {
        let mut totals = MovementTotals::default();
        let mut checkpoint_count = 0;

        for record in records {
            if record.occurred_at() < self.start || record.occurred_at() > self.end {
                continue;
            }
            if let Some(checkpoint) = Checkpoint::from_movement(&record) {
                checkpoint_count += 1;
                self.checkpoints.push(checkpoint);
            } else {
                totals.record(&record);
                self.movements.push(record);
            }
        }

        self.products.push(ProductPeriod {
            product_id,
            stock_before_start: stock.before_start,
            stock_at_start: stock.at_start,
            stock_at_end: stock.at_end,
            totals,
            checkpoint_count,
        });
        self
    }

    pub fn finish(self) -> MovementSummary {
        let SummaryBuilder {
            start,
            end,
            mut checkpoints,
            mut movements,
            products,
        } = self;

        sort_chronologically(&mut movements);
        checkpoints.sort_by_key(Checkpoint::sort_key);

        let mut totals = MovementTotals::default();
        for period in &products {
            totals.merge(&period.totals);
        }

        MovementSummary {
            start,
            end,
            stock_before_start: sum_by(&products, |p| p.stock_before_start),
            stock_at_start: sum_by(&products, |p| p.stock_at_start),
            stock_at_end: sum_by(&products, |p| p.stock_at_end),
            checkpoints,
            movements,
            totals,
            products,
        }
    }
}

fn sum_by(products: &[ProductPeriod], field: impl Fn(&ProductPeriod) -> Decimal) -> Decimal {
    products.iter().map(field).fold(Decimal::ZERO, Decimal::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use stockledger_core::MovementId;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn stock(before_start: Decimal, at_start: Decimal, at_end: Decimal) -> PeriodStock {
        PeriodStock {
            before_start,
            at_start,
            at_end,
        }
    }

    #[test]
    fn empty_period_is_well_formed() {
        let summary = SummaryBuilder::new(day(1), day(31)).finish();
        assert!(!summary.has_activity());
        assert!(summary.totals.is_empty());
        assert_eq!(summary.totals.net, Decimal::ZERO);
        assert_eq!(summary.stock_at_start, Decimal::ZERO);
        assert!(summary.products.is_empty());
    }

    #[test]
    fn splits_checkpoints_from_movements_and_totals_them() {
        let p = ProductId::new(1);
        let records = vec![
            Movement::checkpoint(MovementId::new(1), p, day(1), dec!(100)).unwrap(),
            Movement::entry(MovementId::new(2), p, day(15), dec!(50)).unwrap().with_unit_cost(dec!(2)),
            Movement::exit(MovementId::new(3), p, day(20), dec!(30)).unwrap().with_unit_cost(dec!(2)),
            Movement::entry(MovementId::new(4), p, day(28), dec!(9)).unwrap(),
        ];

        let mut builder = SummaryBuilder::new(day(1), day(25));
        builder.add_product(p, stock(dec!(0), dec!(100), dec!(120)), records);
        let summary = builder.finish();

        assert_eq!(summary.checkpoints.len(), 1);
        assert_eq!(summary.movements.len(), 2);
        assert_eq!(summary.totals.entries, dec!(50));
        assert_eq!(summary.totals.exits, dec!(30));
        assert_eq!(summary.totals.net, dec!(20));
        assert_eq!(summary.totals.entry_value, dec!(100));
        assert_eq!(summary.totals.exit_value, dec!(60));
        assert_eq!(summary.product(p).unwrap().checkpoint_count, 1);
    }

    #[test]
    fn merges_products_chronologically() {
        let a = ProductId::new(1);
        let b = ProductId::new(2);

        let mut builder = SummaryBuilder::new(day(1), day(31));
        builder
            .add_product(a, stock(dec!(0), dec!(0), dec!(5)), vec![Movement::entry(MovementId::new(10), a, day(12), dec!(5)).unwrap()])
            .add_product(b, stock(dec!(3), dec!(3), dec!(1)), vec![Movement::exit(MovementId::new(11), b, day(3), dec!(2)).unwrap()]);
        let summary = builder.finish();

        let ids: Vec<i64> = summary.movements.iter().map(|m| m.id_typed().get()).collect();
        assert_eq!(ids, vec![11, 10]);
        assert_eq!(summary.stock_before_start, dec!(3));
        assert_eq!(summary.stock_at_start, dec!(3));
        assert_eq!(summary.stock_at_end, dec!(6));
        assert_eq!(summary.totals.net, dec!(3));
        assert_eq!(summary.stock_before_start + summary.totals.net, summary.stock_at_end);
    }
}
