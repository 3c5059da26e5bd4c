//! Batch validation of stored stock figures against replayed ledger values.
//!
//! Pipeline: select products → compute each one independently on a worker pool →
//! classify → reduce into a [`ValidationReport`]. Every item runs behind its own
//! failure boundary: an error or a panic while handling one product becomes an
//! `error` entry for that product and the rest of the batch carries on.

use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{ProductId, StockError};
use stockledger_inventory::{ComputedStock, ValidationEntry, ValidationReport};
use stockledger_products::{Product, ProductFilter};

use super::forward::ForwardReplayEngine;
use crate::catalog::ProductCatalog;
use crate::ledger::LedgerStore;

/// Which products a validation run covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ProductScope {
    /// Exactly these products, validated in id order (duplicates are validated once).
    Ids(Vec<ProductId>),
    /// Every active catalog product passing the filter.
    AllActive(ProductFilter),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSelector {
    pub scope: ProductScope,
    /// At most this many products per run.
    pub limit: Option<usize>,
}

impl ProductSelector {
    pub fn ids(ids: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            scope: ProductScope::Ids(ids.into_iter().collect()),
            limit: None,
        }
    }

    pub fn all_active() -> Self {
        Self::matching(ProductFilter::default())
    }

    pub fn matching(filter: ProductFilter) -> Self {
        Self {
            scope: ProductScope::AllActive(filter),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Work item: a product already loaded by the selection query, an id still to be looked
/// up inside the worker, or a listed row the catalog could not decode.
enum Candidate {
    Loaded(Product),
    Pending(ProductId),
    Undecodable(ProductId, StockError),
}

impl Candidate {
    fn product_id(&self) -> ProductId {
        match self {
            Candidate::Loaded(p) => p.id_typed(),
            Candidate::Pending(id) | Candidate::Undecodable(id, _) => *id,
        }
    }
}

pub struct ValidationEngine<L, C> {
    ledger: L,
    catalog: C,
    workers: usize,
}

impl<L, C> ValidationEngine<L, C>
where
    L: LedgerStore,
    C: ProductCatalog,
{
    pub fn new(ledger: L, catalog: C) -> Self {
        Self {
            ledger,
            catalog,
            workers: 1,
        }
    }

    /// Size of the worker pool. Values below 1 are treated as 1.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Validate every selected product as of `now`.
    ///
    /// Only the selection step can fail the whole run (e.g. the catalog is unreachable
    /// while listing active products); per-product failures land in the report.
    pub fn run(
        &self,
        selector: &ProductSelector,
        threshold: Decimal,
        now: DateTime<Utc>,
    ) -> Result<ValidationReport, StockError> {
        let run_id = Uuid::now_v7();
        let candidates = self.select(selector)?;

        tracing::info!(
            %run_id,
            products = candidates.len(),
            workers = self.workers,
            %threshold,
            "starting stock validation"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("stock-validation-{i}"))
            .build()
            .map_err(|e| StockError::computation(format!("failed to start validation workers: {e}")))?;

        let entries: Vec<ValidationEntry> = pool.install(|| {
            candidates
                .par_iter()
                .map(|candidate| self.validate_isolated(candidate, threshold, now))
                .collect()
        });

        let report = ValidationReport::aggregate(run_id, now, threshold, entries);
        tracing::info!(
            %run_id,
            total = report.total,
            matches = report.matches,
            discrepancies = report.discrepancy_count,
            errors = report.error_count,
            accuracy = %report.accuracy,
            "stock validation finished"
        );
        Ok(report)
    }

    fn select(&self, selector: &ProductSelector) -> Result<Vec<Candidate>, StockError> {
        let mut candidates: Vec<Candidate> = match &selector.scope {
            ProductScope::Ids(ids) => ids
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(Candidate::Pending)
                .collect(),
            ProductScope::AllActive(filter) => {
                let mut filter = filter.clone();
                filter.limit = match (filter.limit, selector.limit) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                self.catalog
                    .get_active_products(&filter)?
                    .into_iter()
                    .map(|listed| match listed {
                        Ok(product) => Candidate::Loaded(product),
                        Err(undecoded) => Candidate::Undecodable(undecoded.id, undecoded.error.into()),
                    })
                    .collect()
            }
        };

        if let Some(limit) = selector.limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }

    fn validate_isolated(
        &self,
        candidate: &Candidate,
        threshold: Decimal,
        now: DateTime<Utc>,
    ) -> ValidationEntry {
        let product_id = candidate.product_id();
        let result = catch_unwind(AssertUnwindSafe(|| self.validate_one(candidate, threshold, now)));

        let entry = match result {
            Ok(entry) => entry,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let (code, name) = match candidate {
                    Candidate::Loaded(p) => (Some(p.code().to_string()), Some(p.name().to_string())),
                    Candidate::Pending(_) | Candidate::Undecodable(..) => (None, None),
                };
                ValidationEntry::failed(
                    product_id,
                    code,
                    name,
                    StockError::computation(format!("panic while validating product {product_id}: {message}")),
                )
            }
        };

        if let Some(error) = &entry.error {
            tracing::warn!(%product_id, kind = ?error.kind(), error = %error, "product validation failed");
        }
        entry
    }

    fn validate_one(
        &self,
        candidate: &Candidate,
        threshold: Decimal,
        now: DateTime<Utc>,
    ) -> ValidationEntry {
        let loaded;
        let product = match candidate {
            Candidate::Loaded(p) => p,
            Candidate::Pending(id) => match self.catalog.get_product(*id) {
                Ok(Some(p)) => {
                    loaded = p;
                    &loaded
                }
                Ok(None) => return ValidationEntry::failed(*id, None, None, StockError::not_found(*id)),
                Err(e) => return ValidationEntry::failed(*id, None, None, e.into()),
            },
            Candidate::Undecodable(id, error) => {
                return ValidationEntry::failed(*id, None, None, error.clone());
            }
        };

        let product_id = product.id_typed();
        let computed = ForwardReplayEngine::new(&self.ledger)
            .compute(product_id, now)
            .map(|c| ComputedStock {
                quantity: c.quantity,
                unclassified: c.unclassified,
            });

        ValidationEntry::classify(product_id, Some(product), computed, threshold)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
