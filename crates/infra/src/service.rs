//! Caller-facing facade over the reconstruction engines.
//!
//! `StockService` owns its collaborators (ledger, catalog, clock, configuration) and
//! performs the single-item checks (product existence, temporal ranges) before handing
//! work to the stateless engines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use stockledger_core::{Clock, ProductId, StockError, StockResult, SystemClock};
use stockledger_inventory::{BackwardOutcome, ExtendedValidationReport, MovementSummary, ValidationReport};
use stockledger_products::Product;

use crate::catalog::ProductCatalog;
use crate::config::StockConfig;
use crate::engine::{
    BackwardReplayEngine, ForwardReplayEngine, MovementSummaryService, ProductSelector, StockComputation,
    ValidationEngine,
};
use crate::ledger::LedgerStore;

/// One point of a stock series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPoint {
    pub at: DateTime<Utc>,
    pub quantity: Decimal,
}

pub struct StockService<L, C, K = SystemClock> {
    ledger: L,
    catalog: C,
    clock: K,
    config: StockConfig,
}

impl<L, C> StockService<L, C, SystemClock>
where
    L: LedgerStore,
    C: ProductCatalog,
{
    pub fn new(ledger: L, catalog: C, config: StockConfig) -> Self {
        Self::with_clock(ledger, catalog, SystemClock, config)
    }
}

impl<L, C, K> StockService<L, C, K>
where
    L: LedgerStore,
    C: ProductCatalog,
    K: Clock,
{
    pub fn with_clock(ledger: L, catalog: C, clock: K, config: StockConfig) -> Self {
        Self {
            ledger,
            catalog,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    /// Stock of `product_id` as of `at` (inclusive).
    ///
    /// Fails with `NotFound` for an unknown product and `InvalidTemporalRange` when `at`
    /// is in the future.
    pub fn compute_stock_at(
        &self,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> StockResult<Decimal> {
        self.compute_stock_detail(product_id, at).map(|c| c.quantity)
    }

    /// Like [`compute_stock_at`](Self::compute_stock_at), with the governing checkpoint and
    /// replay counters.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub fn compute_stock_detail(
        &self,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> StockResult<StockComputation> {
        self.ensure_not_future(at)?;
        self.require_product(product_id)?;
        ForwardReplayEngine::new(&self.ledger).compute(product_id, at)
    }

    /// Stock at each of `instants`, in the order given.
    #[instrument(skip(self, instants), fields(product_id = %product_id, points = instants.len()), err)]
    pub fn stock_series(
        &self,
        product_id: ProductId,
        instants: &[DateTime<Utc>],
    ) -> StockResult<Vec<StockPoint>> {
        for &at in instants {
            self.ensure_not_future(at)?;
        }
        self.require_product(product_id)?;

        let engine = ForwardReplayEngine::new(&self.ledger);
        instants
            .iter()
            .map(|&at| {
                engine.compute(product_id, at).map(|c| StockPoint {
                    at,
                    quantity: c.quantity,
                })
            })
            .collect()
    }

    /// Reconstruct the stock at `target` by walking back from the product's stored
    /// `current_stock`, taken as exact at the clock's "now".
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub fn reconstruct_from_current(
        &self,
        product_id: ProductId,
        target: DateTime<Utc>,
    ) -> StockResult<BackwardOutcome> {
        let now = self.clock.now();
        if target > now {
            return Err(StockError::invalid_range(format!("target {target} is in the future (now {now})")));
        }
        let product = self.require_product(product_id)?;

        BackwardReplayEngine::new(&self.ledger)
            .with_policy(self.config.backward_policy)
            .reconstruct(product_id, product.current_stock(), now, target)
    }

    /// Movements, checkpoints, totals and opening/closing stock over `[start, end]`.
    ///
    /// Every product must exist. An empty id list yields an empty summary.
    #[instrument(skip(self, product_ids), fields(products = product_ids.len()), err)]
    pub fn summarize_movements(
        &self,
        product_ids: &[ProductId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StockResult<MovementSummary> {
        if start > end {
            return Err(StockError::invalid_range(format!("start {start} is after end {end}")));
        }
        for &product_id in product_ids {
            self.require_product(product_id)?;
        }
        MovementSummaryService::new(&self.ledger).summarize(product_ids, start, end)
    }

    /// Validate stored stock against replayed stock for the selected products.
    ///
    /// `threshold` overrides the configured tolerance. The selector's own limit wins over
    /// the configured one.
    #[instrument(skip(self, selector), err)]
    pub fn validate_stock(
        &self,
        selector: &ProductSelector,
        threshold: Option<Decimal>,
    ) -> StockResult<ValidationReport> {
        let threshold = threshold.unwrap_or(self.config.discrepancy_threshold);
        if threshold.is_sign_negative() {
            return Err(StockError::invalid_input(format!("threshold must not be negative, got {threshold}")));
        }

        let mut selector = selector.clone();
        if selector.limit.is_none() {
            selector.limit = self.config.validation_limit;
        }

        ValidationEngine::new(&self.ledger, &self.catalog)
            .with_workers(self.config.validation_workers)
            .run(&selector, threshold, self.clock.now())
    }

    /// [`validate_stock`](Self::validate_stock) plus distribution statistics and
    /// recommendations.
    pub fn generate_validation_report(
        &self,
        selector: &ProductSelector,
        threshold: Option<Decimal>,
    ) -> StockResult<ExtendedValidationReport> {
        let report = self.validate_stock(selector, threshold)?;
        Ok(ExtendedValidationReport::from_report(report, &self.config.recommendation_policy()))
    }

    fn ensure_not_future(&self, at: DateTime<Utc>) -> StockResult<()> {
        let now = self.clock.now();
        if at > now {
            return Err(StockError::invalid_range(format!("instant {at} is in the future (now {now})")));
        }
        Ok(())
    }

    fn require_product(&self, product_id: ProductId) -> StockResult<Product> {
        self.catalog
            .get_product(product_id)?
            .ok_or_else(|| StockError::not_found(product_id))
    }
}
