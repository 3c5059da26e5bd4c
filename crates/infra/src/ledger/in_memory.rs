use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use stockledger_core::{Entity, MovementId, ProductId};
use stockledger_inventory::Movement;

use super::query::{SortOrder, TimeRange};
use super::r#trait::{LedgerError, LedgerStore};

/// In-memory append-only ledger.
///
/// Intended for tests/dev. Each product's records are kept in a map keyed by
/// `(timestamp, id)`, so reads come out in ledger order without a sort.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    products: RwLock<HashMap<ProductId, BTreeMap<(DateTime<Utc>, MovementId), Movement>>>,
    ids: RwLock<HashSet<MovementId>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-loaded with `movements`.
    pub fn with_movements(
        movements: impl IntoIterator<Item = Movement>,
    ) -> Result<Self, LedgerError> {
        let store = Self::new();
        store.append(movements)?;
        Ok(store)
    }

    /// Append records (stand-in for the external ingestion path).
    ///
    /// Movement ids are unique across the ledger; a duplicate rejects the whole batch.
    pub fn append(
        &self,
        movements: impl IntoIterator<Item = Movement>,
    ) -> Result<usize, LedgerError> {
        let batch: Vec<Movement> = movements.into_iter().collect();

        let mut ids = self
            .ids
            .write()
            .map_err(|_| LedgerError::Unavailable("lock poisoned".to_string()))?;

        let mut seen = HashSet::with_capacity(batch.len());
        for (idx, m) in batch.iter().enumerate() {
            let id = m.id();
            if ids.contains(&id) || !seen.insert(id) {
                return Err(LedgerError::InvalidAppend(format!(
                    "duplicate movement id {id} (index {idx})"
                )));
            }
        }

        let mut products = self
            .products
            .write()
            .map_err(|_| LedgerError::Unavailable("lock poisoned".to_string()))?;

        let count = batch.len();
        for m in batch {
            ids.insert(m.id());
            products.entry(m.product_id()).or_default().insert(m.sort_key(), m);
        }

        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.ids.read().map(|ids| ids.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn query_movements(
        &self,
        product_id: ProductId,
        range: TimeRange,
        order: SortOrder,
    ) -> Result<Vec<Movement>, LedgerError> {
        let products = self
            .products
            .read()
            .map_err(|_| LedgerError::Unavailable("lock poisoned".to_string()))?;

        let Some(ledger) = products.get(&product_id) else {
            return Ok(vec![]);
        };

        let matching = ledger.values().filter(|m| range.contains(m.occurred_at()));
        let out = match order {
            SortOrder::Ascending => matching.cloned().collect(),
            SortOrder::Descending => {
                let mut v: Vec<Movement> = matching.cloned().collect();
                v.reverse();
                v
            }
        };
        Ok(out)
    }

    fn query_latest_checkpoint(
        &self,
        product_id: ProductId,
        at_or_before: DateTime<Utc>,
    ) -> Result<Option<Movement>, LedgerError> {
        let products = self
            .products
            .read()
            .map_err(|_| LedgerError::Unavailable("lock poisoned".to_string()))?;

        Ok(products.get(&product_id).and_then(|ledger| {
            ledger
                .values()
                .rev()
                .filter(|m| m.occurred_at() <= at_or_before)
                .find(|m| m.is_checkpoint())
                .cloned()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    const P: ProductId = ProductId::new(1);

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn seeded() -> InMemoryLedgerStore {
        InMemoryLedgerStore::with_movements(vec![
            Movement::entry(MovementId::new(5), P, day(3), dec!(1)).unwrap(),
            Movement::checkpoint(MovementId::new(2), P, day(1), dec!(10)).unwrap(),
            Movement::checkpoint(MovementId::new(7), P, day(3), dec!(20)).unwrap(),
            Movement::exit(MovementId::new(4), P, day(2), dec!(1)).unwrap(),
            Movement::entry(MovementId::new(9), ProductId::new(2), day(2), dec!(1)).unwrap(),
        ])
        .unwrap()
    }

    fn ids(v: &[Movement]) -> Vec<i64> {
        v.iter().map(|m| m.id_typed().get()).collect()
    }

    #[test]
    fn reads_in_timestamp_then_id_order() {
        let store = seeded();
        let asc = store.query_movements(P, TimeRange::all(), SortOrder::Ascending).unwrap();
        assert_eq!(ids(&asc), vec![2, 4, 5, 7]);

        let desc = store.query_movements(P, TimeRange::all(), SortOrder::Descending).unwrap();
        assert_eq!(ids(&desc), vec![7, 5, 4, 2]);
    }

    #[test]
    fn filters_by_range() {
        let store = seeded();
        let window = store
            .query_movements(P, TimeRange::replay_window(Some(day(1)), day(2)), SortOrder::Ascending)
            .unwrap();
        assert_eq!(ids(&window), vec![4]);
    }

    #[test]
    fn latest_checkpoint_breaks_ties_by_id() {
        let store = seeded();
        assert_eq!(store.query_latest_checkpoint(P, day(3)).unwrap().unwrap().id_typed().get(), 7);
        assert_eq!(store.query_latest_checkpoint(P, day(2)).unwrap().unwrap().id_typed().get(), 2);
        assert!(store.query_latest_checkpoint(P, Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap()).unwrap().is_none());
    }

    #[test]
    fn unknown_product_reads_empty() {
        let store = seeded();
        assert!(store.query_movements(ProductId::new(99), TimeRange::all(), SortOrder::Ascending).unwrap().is_empty());
        assert!(store.query_latest_checkpoint(ProductId::new(99), day(9)).unwrap().is_none());
    }

    #[test]
    fn duplicate_ids_reject_the_batch() {
        let store = seeded();
        let err = store
            .append(vec![
                Movement::entry(MovementId::new(100), P, day(4), dec!(1)).unwrap(),
                Movement::entry(MovementId::new(5), P, day(4), dec!(1)).unwrap(),
            ])
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAppend(_)));
        assert_eq!(store.len(), 5);
    }
}
