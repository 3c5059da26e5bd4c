use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{MovementId, ProductId};

use crate::movement::Movement;

/// A stock reset: the absolute quantity of a product at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub movement_id: MovementId,
    pub product_id: ProductId,
    pub at: DateTime<Utc>,
    pub quantity: Decimal,
}

impl Checkpoint {
    /// View a ledger record as a checkpoint. `None` for ordinary movements.
    pub fn from_movement(movement: &Movement) -> Option<Self> {
        if !movement.is_checkpoint() {
            return None;
        }
        Some(Self {
            movement_id: movement.id_typed(),
            product_id: movement.product_id(),
            at: movement.occurred_at(),
            quantity: movement.quantity(),
        })
    }

    pub fn sort_key(&self) -> (DateTime<Utc>, MovementId) {
        (self.at, self.movement_id)
    }
}

/// Starting point of a forward replay.
///
/// Either the governing checkpoint, or zero when the product has never been reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    quantity: Decimal,
    checkpoint: Option<Checkpoint>,
}

impl Baseline {
    pub fn zero() -> Self {
        Self {
            quantity: Decimal::ZERO,
            checkpoint: None,
        }
    }

    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            quantity: checkpoint.quantity,
            checkpoint: Some(checkpoint),
        }
    }

    /// Baseline governed by `checkpoint` if present, zero otherwise.
    pub fn from_optional(checkpoint: Option<Checkpoint>) -> Self {
        checkpoint.map(Self::from_checkpoint).unwrap_or_else(Self::zero)
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoint.as_ref()
    }

    /// Instant fixed by the governing checkpoint (`None` ⇒ replay from the beginning).
    pub fn checkpoint_at(&self) -> Option<DateTime<Utc>> {
        self.checkpoint.as_ref().map(|c| c.at)
    }

    /// `(baseline_quantity, checkpoint_instant)` pair.
    pub fn as_pair(&self) -> (Decimal, Option<DateTime<Utc>>) {
        (self.quantity, self.checkpoint_at())
    }
}

impl Default for Baseline {
    fn default() -> Self {
        Self::zero()
    }
}
