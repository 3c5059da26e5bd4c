//! Stock audit: validates every active product's stored stock against the ledger and
//! prints the extended report as JSON on stdout.
//!
//! Configuration comes from the environment (see `stockledger_infra::config`). Exit
//! status is 0 when every product matches, 1 when the report contains discrepancies or
//! per-product errors.

use std::process::ExitCode;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use stockledger_infra::{PostgresLedgerStore, PostgresProductCatalog, ProductSelector, StockConfig, StockService};

fn main() -> anyhow::Result<ExitCode> {
    stockledger_observability::init();

    let config = StockConfig::from_env().context("invalid configuration")?;
    let database_url = config.require_database_url()?.to_string();

    // The stores block on this runtime from plain threads, so main stays outside it.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let max_connections = u32::try_from(config.validation_workers + 1).unwrap_or(u32::MAX);
    let pool = runtime
        .block_on(
            PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(&database_url),
        )
        .context("failed to connect to Postgres")?;

    let ledger = PostgresLedgerStore::new(pool.clone(), runtime.handle().clone());
    let catalog = PostgresProductCatalog::new(pool, runtime.handle().clone());
    let service = StockService::new(ledger, catalog, config);

    let report = service
        .generate_validation_report(&ProductSelector::all_active(), None)
        .context("stock validation failed")?;

    serde_json::to_writer_pretty(std::io::stdout().lock(), &report).context("failed to write report")?;
    println!();

    tracing::info!(
        run_id = %report.report.run_id,
        accuracy = %report.report.accuracy,
        recommendations = report.recommendations.len(),
        "audit complete"
    );

    if report.report.discrepancy_count > 0 || report.report.error_count > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
