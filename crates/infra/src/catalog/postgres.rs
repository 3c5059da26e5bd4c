//! Postgres-backed product catalog.
//!
//! Reads the `products` table:
//!
//! ```sql
//! CREATE TABLE products (
//!     id            BIGINT PRIMARY KEY,
//!     code          VARCHAR(50) NOT NULL,
//!     name          TEXT NOT NULL,
//!     active        BOOLEAN NOT NULL DEFAULT TRUE,
//!     current_stock NUMERIC(18, 4) NOT NULL DEFAULT 0,
//!     unit_cost     NUMERIC(18, 4) NOT NULL DEFAULT 0
//! );
//! ```

use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use tokio::runtime::Handle;
use tracing::instrument;

use stockledger_core::ProductId;
use stockledger_products::{Product, ProductFilter};

use super::r#trait::{ActiveProduct, CatalogError, ProductCatalog, UndecodedProduct};

const PRODUCT_COLUMNS: &str = "id, code, name, active, current_stock, unit_cost";

#[derive(Debug, Clone)]
pub struct PostgresProductCatalog {
    pool: Arc<PgPool>,
    runtime: Handle,
}

impl PostgresProductCatalog {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            runtime,
        }
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_product", e))?;

        match row {
            Some(row) => {
                let row = ProductRow::from_row(&row).map_err(|e| map_sqlx_error("fetch_product", e))?;
                Ok(Some(row.try_into()?))
            }
            None => Ok(None),
        }
    }

    /// Rows whose id decodes but whose remaining columns do not (or fail product
    /// validation) come back as [`UndecodedProduct`] entries; an unreadable id fails the
    /// listing.
    #[instrument(skip(self), err)]
    pub async fn fetch_active_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ActiveProduct>, CatalogError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        qb.push(PRODUCT_COLUMNS).push(" FROM products WHERE active = TRUE");

        if let Some(prefix) = &filter.code_prefix {
            qb.push(" AND code ILIKE ")
                .push_bind(format!("{}%", escape_like(prefix)));
        }
        if let Some(fragment) = &filter.name_contains {
            qb.push(" AND name ILIKE ")
                .push_bind(format!("%{}%", escape_like(fragment)));
        }
        qb.push(" ORDER BY id ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_active_products", e))?;

        rows.iter().map(decode_listed_row).collect()
    }

    fn block_on<F, T>(&self, fut: F) -> Result<T, CatalogError>
    where
        F: Future<Output = Result<T, CatalogError>>,
    {
        if Handle::try_current().is_ok() {
            return Err(CatalogError::Unavailable(
                "PostgresProductCatalog was called from inside an async task; call it from a blocking thread".to_string(),
            ));
        }
        self.runtime.block_on(fut)
    }
}

impl ProductCatalog for PostgresProductCatalog {
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        self.block_on(self.fetch_product(id))
    }

    fn get_active_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ActiveProduct>, CatalogError> {
        self.block_on(self.fetch_active_products(filter))
    }
}

fn decode_listed_row(row: &PgRow) -> Result<ActiveProduct, CatalogError> {
    let id: i64 = row
        .try_get("id")
        .map_err(|e| map_sqlx_error("fetch_active_products", e))?;

    let product = ProductRow::from_row(row)
        .map_err(|e| map_sqlx_error("fetch_active_products", e))
        .and_then(Product::try_from);

    Ok(product.map_err(|error| {
        tracing::warn!(product_id = id, %error, "catalog row failed to decode");
        UndecodedProduct {
            id: ProductId::new(id),
            error,
        }
    }))
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            CatalogError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => CatalogError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            CatalogError::Decode(format!("{operation}: {err}"))
        }
        _ => CatalogError::Query(format!("sqlx error in {operation}: {err}")),
    }
}

#[derive(Debug)]
struct ProductRow {
    id: i64,
    code: String,
    name: String,
    active: bool,
    current_stock: Decimal,
    unit_cost: Decimal,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            active: row.try_get("active")?,
            current_stock: row.try_get("current_stock")?,
            unit_cost: row.try_get("unit_cost")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = CatalogError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Product::new(
            ProductId::new(row.id),
            row.code.trim(),
            row.name,
            row.active,
            row.current_stock,
            row.unit_cost,
        )
        .map_err(|e| CatalogError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }
}
