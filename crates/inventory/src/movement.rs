use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, MovementId, ProductId, StockError};

/// Document reference that marks a ledger record as a stock reset (checkpoint).
pub const CHECKPOINT_DOCUMENT: &str = "000000";

/// Longest document reference the ledger schema accepts.
pub const MAX_DOCUMENT_REFERENCE_LEN: usize = 50;

/// Direction of a ledger movement.
///
/// The stored quantity is never signed; the kind alone decides whether it adds or removes
/// stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Entry,
    Exit,
    /// Ingestion could not tell the direction. Excluded from replay.
    Unclassified,
}

impl MovementKind {
    /// Decode the kind column written by ingestion jobs.
    ///
    /// Legacy imports used single-letter codes (`E`/`S`); newer jobs write the full word.
    /// Anything else, including a missing value, is `Unclassified`.
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(|c| c.trim().to_uppercase()).as_deref() {
            Some("E" | "ENTRY" | "ENTRADA" | "IN") => MovementKind::Entry,
            Some("S" | "X" | "EXIT" | "SAIDA" | "SAÍDA" | "OUT") => MovementKind::Exit,
            _ => MovementKind::Unclassified,
        }
    }

    pub fn as_code(&self) -> Option<&'static str> {
        match self {
            MovementKind::Entry => Some("E"),
            MovementKind::Exit => Some("S"),
            MovementKind::Unclassified => None,
        }
    }
}

/// One immutable ledger record.
///
/// A record whose document reference equals [`CHECKPOINT_DOCUMENT`] is a checkpoint: its
/// quantity is an absolute stock level rather than a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    id: MovementId,
    product_id: ProductId,
    occurred_at: DateTime<Utc>,
    kind: MovementKind,
    quantity: Decimal,
    document_reference: String,
    unit_cost: Decimal,
    total_value: Decimal,
    notes: Option<String>,
}

impl Movement {
    /// Build an ordinary movement with an empty document reference and zero cost.
    pub fn new(
        id: MovementId,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
        kind: MovementKind,
        quantity: Decimal,
    ) -> Result<Self, StockError> {
        if quantity.is_sign_negative() && !quantity.is_zero() {
            return Err(StockError::invalid_input(format!(
                "movement {id}: quantity cannot be negative ({quantity})"
            )));
        }

        Ok(Self {
            id,
            product_id,
            occurred_at,
            kind,
            quantity,
            document_reference: String::new(),
            unit_cost: Decimal::ZERO,
            total_value: Decimal::ZERO,
            notes: None,
        })
    }

    pub fn entry(
        id: MovementId,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
        quantity: Decimal,
    ) -> Result<Self, StockError> {
        Self::new(id, product_id, occurred_at, MovementKind::Entry, quantity)
    }

    pub fn exit(
        id: MovementId,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
        quantity: Decimal,
    ) -> Result<Self, StockError> {
        Self::new(id, product_id, occurred_at, MovementKind::Exit, quantity)
    }

    /// Build a checkpoint fixing the absolute stock level at `occurred_at`.
    ///
    /// Resets are written as entries by ingestion; the kind is irrelevant to replay.
    pub fn checkpoint(
        id: MovementId,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
        quantity: Decimal,
    ) -> Result<Self, StockError> {
        let mut movement = Self::new(id, product_id, occurred_at, MovementKind::Entry, quantity)?;
        movement.document_reference = CHECKPOINT_DOCUMENT.to_string();
        Ok(movement)
    }

    pub fn with_document_reference(
        mut self,
        reference: impl Into<String>,
    ) -> Result<Self, StockError> {
        let reference = reference.into();
        if reference.chars().count() > MAX_DOCUMENT_REFERENCE_LEN {
            return Err(StockError::invalid_input(format!(
                "movement {}: document reference longer than {MAX_DOCUMENT_REFERENCE_LEN} characters",
                self.id
            )));
        }
        self.document_reference = reference;
        Ok(self)
    }

    /// Set the unit cost; the total value follows as `quantity × unit_cost`.
    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = unit_cost;
        self.total_value = self.quantity * unit_cost;
        self
    }

    /// Override the stored total value (ingestion may carry rounding from the source document).
    pub fn with_total_value(mut self, total_value: Decimal) -> Self {
        self.total_value = total_value;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn id_typed(&self) -> MovementId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn document_reference(&self) -> &str {
        &self.document_reference
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn total_value(&self) -> Decimal {
        self.total_value
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_checkpoint(&self) -> bool {
        self.document_reference == CHECKPOINT_DOCUMENT
    }

    /// Total-order key of the ledger: `(timestamp, id)`.
    pub fn sort_key(&self) -> (DateTime<Utc>, MovementId) {
        (self.occurred_at, self.id)
    }

    /// Effect of this record on a running quantity, if it has one.
    ///
    /// `None` for checkpoints (absolute, not a delta) and unclassified records.
    pub fn signed_delta(&self) -> Option<Decimal> {
        if self.is_checkpoint() {
            return None;
        }
        match self.kind {
            MovementKind::Entry => Some(self.quantity),
            MovementKind::Exit => Some(-self.quantity),
            MovementKind::Unclassified => None,
        }
    }
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Sort records into ledger order, `(timestamp, id)` ascending.
pub fn sort_chronologically(movements: &mut [Movement]) {
    movements.sort_by_key(Movement::sort_key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn pid() -> ProductId {
        ProductId::new(1)
    }

    #[test]
    fn kind_decodes_legacy_and_current_codes() {
        assert_eq!(MovementKind::from_code(Some("E")), MovementKind::Entry);
        assert_eq!(MovementKind::from_code(Some(" saida ")), MovementKind::Exit);
        assert_eq!(MovementKind::from_code(Some("exit")), MovementKind::Exit);
        assert_eq!(MovementKind::from_code(Some("?")), MovementKind::Unclassified);
        assert_eq!(MovementKind::from_code(None), MovementKind::Unclassified);
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let err = Movement::entry(MovementId::new(1), pid(), at(1), dec!(-1)).unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)));
    }

    #[test]
    fn sign_comes_from_kind() {
        let entry = Movement::entry(MovementId::new(1), pid(), at(1), dec!(5)).unwrap();
        let exit = Movement::exit(MovementId::new(2), pid(), at(1), dec!(5)).unwrap();
        let unknown = Movement::new(MovementId::new(3), pid(), at(1), MovementKind::Unclassified, dec!(5)).unwrap();

        assert_eq!(entry.signed_delta(), Some(dec!(5)));
        assert_eq!(exit.signed_delta(), Some(dec!(-5)));
        assert_eq!(unknown.signed_delta(), None);
    }

    #[test]
    fn checkpoint_is_recognized_by_document_sentinel() {
        let cp = Movement::checkpoint(MovementId::new(1), pid(), at(1), dec!(100)).unwrap();
        assert!(cp.is_checkpoint());
        assert_eq!(cp.signed_delta(), None);

        let ordinary = Movement::entry(MovementId::new(2), pid(), at(1), dec!(100))
            .unwrap()
            .with_document_reference("NF-000123")
            .unwrap();
        assert!(!ordinary.is_checkpoint());

        let spelled = Movement::entry(MovementId::new(3), pid(), at(1), dec!(100))
            .unwrap()
            .with_document_reference(CHECKPOINT_DOCUMENT)
            .unwrap();
        assert!(spelled.is_checkpoint());
    }

    #[test]
    fn document_reference_length_is_bounded() {
        let long = "X".repeat(MAX_DOCUMENT_REFERENCE_LEN + 1);
        let err = Movement::entry(MovementId::new(1), pid(), at(1), dec!(1))
            .unwrap()
            .with_document_reference(long)
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)));
    }

    #[test]
    fn unit_cost_sets_total_value() {
        let m = Movement::entry(MovementId::new(1), pid(), at(1), dec!(4))
            .unwrap()
            .with_unit_cost(dec!(2.50))
            .with_notes("rental return");
        assert_eq!(m.total_value(), dec!(10.00));
        assert_eq!(m.notes(), Some("rental return"));
    }

    #[test]
    fn sorts_by_timestamp_then_id() {
        let mut ledger = vec![
            Movement::entry(MovementId::new(9), pid(), at(2), dec!(1)).unwrap(),
            Movement::entry(MovementId::new(3), pid(), at(2), dec!(1)).unwrap(),
            Movement::entry(MovementId::new(5), pid(), at(1), dec!(1)).unwrap(),
        ];
        sort_chronologically(&mut ledger);
        let ids: Vec<i64> = ledger.iter().map(|m| m.id_typed().get()).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }
}
