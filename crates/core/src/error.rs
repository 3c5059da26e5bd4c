//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::ProductId;

/// Result type used across the stock reconstruction layer.
pub type StockResult<T> = Result<T, StockError>;

/// Stock reconstruction error.
///
/// Callers branch on [`StockError::kind`], never on message text. Single-item operations
/// return these directly; batch operations attach them to the failing item's entry.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StockError {
    /// The referenced product does not exist in the catalog.
    #[error("product not found: {0}")]
    NotFound(ProductId),

    /// A point query targeted the future, or a range query had `start > end`.
    #[error("invalid temporal range: {0}")]
    InvalidTemporalRange(String),

    /// A ledger record could not be classified.
    ///
    /// Non-fatal: replay excludes such records and counts them. This variant exists so
    /// the condition can be reported with the same vocabulary as real failures.
    #[error("data quality: {0}")]
    DataQuality(String),

    /// Unexpected failure while replaying one product's ledger.
    #[error("computation failed: {0}")]
    Computation(String),

    /// A value failed validation (e.g. malformed identifier, negative quantity).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Discriminant of [`StockError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidTemporalRange,
    DataQuality,
    Computation,
    InvalidInput,
}

impl StockError {
    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidTemporalRange(msg.into())
    }

    pub fn data_quality(msg: impl Into<String>) -> Self {
        Self::DataQuality(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(product_id: ProductId) -> Self {
        Self::NotFound(product_id)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StockError::NotFound(_) => ErrorKind::NotFound,
            StockError::InvalidTemporalRange(_) => ErrorKind::InvalidTemporalRange,
            StockError::DataQuality(_) => ErrorKind::DataQuality,
            StockError::Computation(_) => ErrorKind::Computation,
            StockError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Whether the condition is a signal rather than a failure.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StockError::DataQuality(_))
    }
}
