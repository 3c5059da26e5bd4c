//! Postgres-backed ledger reads.
//!
//! Expected table (schema management lives with the ingestion side):
//!
//! ```sql
//! CREATE TABLE stock_movements (
//!     id                 BIGINT PRIMARY KEY,
//!     product_id         BIGINT NOT NULL,
//!     occurred_at        TIMESTAMPTZ NOT NULL,
//!     kind               TEXT NULL,            -- 'E' / 'S' / NULL
//!     quantity           NUMERIC(18, 4) NOT NULL,
//!     document_reference VARCHAR(50) NOT NULL DEFAULT '',
//!     unit_cost          NUMERIC(18, 4) NOT NULL DEFAULT 0,
//!     total_value        NUMERIC(18, 4) NOT NULL DEFAULT 0,
//!     notes              TEXT NULL
//! );
//! CREATE INDEX stock_movements_replay_idx ON stock_movements (product_id, occurred_at, id);
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx Error | LedgerError |
//! |------------|-------------|
//! | PoolClosed, Io, Tls, PoolTimedOut | `Unavailable` |
//! | ColumnDecode, Decode, ColumnNotFound | `Decode` |
//! | anything else | `Query` |
//!
//! ## Sync bridge
//!
//! `LedgerStore` is synchronous. The store captures a `tokio::runtime::Handle` at
//! construction and blocks on it, so it can be called from plain threads (including
//! the validation worker pool) but not from inside an async task.

use std::future::Future;
use std::ops::Bound;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use tokio::runtime::Handle;
use tracing::instrument;

use stockledger_core::{MovementId, ProductId};
use stockledger_inventory::{CHECKPOINT_DOCUMENT, Movement, MovementKind};

use super::query::{SortOrder, TimeRange};
use super::r#trait::{LedgerError, LedgerStore};

const MOVEMENT_COLUMNS: &str =
    "id, product_id, occurred_at, kind, quantity, document_reference, unit_cost, total_value, notes";

/// Postgres-backed ledger store.
///
/// `Send + Sync`; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
    runtime: Handle,
}

/// Checkpoint lookup. References are trimmed on both sides of the comparison, matching
/// how rows are decoded into [`Movement`]s.
fn latest_checkpoint_sql() -> String {
    format!(
        "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
         WHERE product_id = $1 AND TRIM(document_reference) = $2 AND occurred_at <= $3 \
         ORDER BY occurred_at DESC, id DESC LIMIT 1"
    )
}

impl PostgresLedgerStore {
    /// Create a store over `pool`, driving queries on `runtime`.
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            runtime,
        }
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn fetch_movements(
        &self,
        product_id: ProductId,
        range: TimeRange,
        order: SortOrder,
    ) -> Result<Vec<Movement>, LedgerError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        qb.push(MOVEMENT_COLUMNS)
            .push(" FROM stock_movements WHERE product_id = ")
            .push_bind(product_id.get());

        match range.lower {
            Bound::Included(t) => {
                qb.push(" AND occurred_at >= ").push_bind(t);
            }
            Bound::Excluded(t) => {
                qb.push(" AND occurred_at > ").push_bind(t);
            }
            Bound::Unbounded => {}
        }
        match range.upper {
            Bound::Included(t) => {
                qb.push(" AND occurred_at <= ").push_bind(t);
            }
            Bound::Excluded(t) => {
                qb.push(" AND occurred_at < ").push_bind(t);
            }
            Bound::Unbounded => {}
        }

        let dir = order.as_sql();
        qb.push(format!(" ORDER BY occurred_at {dir}, id {dir}"));

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_movements", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let row = MovementRow::from_row(row).map_err(|e| map_sqlx_error("fetch_movements", e))?;
            out.push(row.try_into()?);
        }

        tracing::debug!(count = out.len(), "loaded ledger slice");
        Ok(out)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn fetch_latest_checkpoint(
        &self,
        product_id: ProductId,
        at_or_before: DateTime<Utc>,
    ) -> Result<Option<Movement>, LedgerError> {
        let sql = latest_checkpoint_sql();
        let row = sqlx::query(&sql)
            .bind(product_id.get())
            .bind(CHECKPOINT_DOCUMENT)
            .bind(at_or_before)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_latest_checkpoint", e))?;

        match row {
            Some(row) => {
                let row = MovementRow::from_row(&row).map_err(|e| map_sqlx_error("fetch_latest_checkpoint", e))?;
                Ok(Some(row.try_into()?))
            }
            None => Ok(None),
        }
    }

    fn block_on<F, T>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        if Handle::try_current().is_ok() {
            return Err(LedgerError::Unavailable(
                "PostgresLedgerStore was called from inside an async task; call it from a blocking thread".to_string(),
            ));
        }
        self.runtime.block_on(fut)
    }
}

impl LedgerStore for PostgresLedgerStore {
    fn query_movements(
        &self,
        product_id: ProductId,
        range: TimeRange,
        order: SortOrder,
    ) -> Result<Vec<Movement>, LedgerError> {
        if range.is_empty() {
            return Ok(vec![]);
        }
        self.block_on(self.fetch_movements(product_id, range, order))
    }

    fn query_latest_checkpoint(
        &self,
        product_id: ProductId,
        at_or_before: DateTime<Utc>,
    ) -> Result<Option<Movement>, LedgerError> {
        self.block_on(self.fetch_latest_checkpoint(product_id, at_or_before))
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            LedgerError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => LedgerError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => LedgerError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            LedgerError::Decode(format!("{operation}: {err}"))
        }
        sqlx::Error::Database(db_err) => {
            LedgerError::Query(format!("database error in {operation}: {}", db_err.message()))
        }
        _ => LedgerError::Query(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct MovementRow {
    id: i64,
    product_id: i64,
    occurred_at: DateTime<Utc>,
    kind: Option<String>,
    quantity: Decimal,
    document_reference: String,
    unit_cost: Decimal,
    total_value: Decimal,
    notes: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            occurred_at: row.try_get("occurred_at")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            document_reference: row.try_get("document_reference")?,
            unit_cost: row.try_get("unit_cost")?,
            total_value: row.try_get("total_value")?,
            notes: row.try_get("notes")?,
        })
    }
}

impl TryFrom<MovementRow> for Movement {
    type Error = LedgerError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let decode = |e: stockledger_core::StockError| LedgerError::Decode(e.to_string());

        let movement = Movement::new(
            MovementId::new(row.id),
            ProductId::new(row.product_id),
            row.occurred_at,
            MovementKind::from_code(row.kind.as_deref()),
            row.quantity,
        )
        .map_err(decode)?
        .with_document_reference(row.document_reference.trim())
        .map_err(decode)?
        .with_unit_cost(row.unit_cost)
        .with_total_value(row.total_value);

        Ok(match row.notes {
            Some(notes) => movement.with_notes(notes),
            None => movement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn row(document_reference: &str) -> MovementRow {
        MovementRow {
            id: 7,
            product_id: 1,
            occurred_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            kind: None,
            quantity: dec!(40),
            document_reference: document_reference.to_string(),
            unit_cost: dec!(0),
            total_value: dec!(0),
            notes: None,
        }
    }

    #[test]
    fn padded_checkpoint_reference_is_a_checkpoint_in_both_paths() {
        let movement = Movement::try_from(row("000000  ")).unwrap();
        assert!(movement.is_checkpoint());
        assert!(latest_checkpoint_sql().contains("TRIM(document_reference) = $2"));
    }

    #[test]
    fn ordinary_reference_is_not_a_checkpoint() {
        let movement = Movement::try_from(row(" NF-1 ")).unwrap();
        assert!(!movement.is_checkpoint());
        assert_eq!(movement.document_reference(), "NF-1");
    }
}
