//! Stored-vs-computed stock comparison: per-product classification and report aggregation.
//!
//! The batch itself (selection, fan-out, per-item failure capture) lives with the
//! infrastructure; this module only defines the data and the pure classify/reduce steps.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{ProductId, StockError, StockResult};
use stockledger_products::Product;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Outcome class of one product's check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Match,
    Discrepancy,
    Error,
}

/// Replayed stock of one product, as handed to classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedStock {
    pub quantity: Decimal,
    pub unclassified: usize,
}

/// Numbers behind a match/discrepancy classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockComparison {
    pub computed: Decimal,
    pub stored: Decimal,
    /// `computed - stored`.
    pub difference: Decimal,
    /// `difference / stored × 100`, with a zero stored figure treated as `1`.
    pub percentage_diff: Decimal,
    /// `difference × unit_cost`.
    pub value_difference: Decimal,
    pub unclassified_movements: usize,
}

impl StockComparison {
    /// Fails with `Computation` when any of the derived figures overflows `Decimal`.
    pub fn new(computed: ComputedStock, stored: Decimal, unit_cost: Decimal) -> StockResult<Self> {
        let overflow = |what: &str| StockError::computation(format!("overflow computing {what}"));

        let difference = computed.quantity.checked_sub(stored).ok_or_else(|| overflow("stock difference"))?;
        let denominator = if stored.is_zero() { Decimal::ONE } else { stored };
        let percentage_diff = difference
            .checked_div(denominator)
            .and_then(|ratio| ratio.checked_mul(HUNDRED))
            .map(round_pct)
            .ok_or_else(|| overflow("percentage difference"))?;
        let value_difference = difference.checked_mul(unit_cost).ok_or_else(|| overflow("value difference"))?;

        Ok(Self {
            computed: computed.quantity,
            stored,
            difference,
            percentage_diff,
            value_difference,
            unclassified_movements: computed.unclassified,
        })
    }

    /// Whether the difference stays within the absolute tolerance.
    pub fn within(&self, threshold: Decimal) -> bool {
        self.difference.abs() <= threshold.abs()
    }
}

/// One product's line in a validation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub product_id: ProductId,
    pub code: Option<String>,
    pub name: Option<String>,
    pub status: ValidationStatus,
    pub comparison: Option<StockComparison>,
    pub error: Option<StockError>,
}

impl ValidationEntry {
    /// Classify one product's replay result.
    ///
    /// `product` is `None` when the catalog lookup itself failed; the entry is then an
    /// error regardless of `computed`.
    pub fn classify(
        product_id: ProductId,
        product: Option<&Product>,
        computed: StockResult<ComputedStock>,
        threshold: Decimal,
    ) -> Self {
        let (code, name) = match product {
            Some(p) => (Some(p.code().to_string()), Some(p.name().to_string())),
            None => (None, None),
        };

        let outcome = match (product, computed) {
            (Some(p), Ok(computed)) => StockComparison::new(computed, p.current_stock(), p.unit_cost()),
            (None, Ok(_)) => Err(StockError::not_found(product_id)),
            (_, Err(e)) => Err(e),
        };

        match outcome {
            Ok(comparison) => {
                let status = if comparison.within(threshold) {
                    ValidationStatus::Match
                } else {
                    ValidationStatus::Discrepancy
                };
                Self {
                    product_id,
                    code,
                    name,
                    status,
                    comparison: Some(comparison),
                    error: None,
                }
            }
            Err(error) => Self::failed(product_id, code, name, error),
        }
    }

    pub fn failed(
        product_id: ProductId,
        code: Option<String>,
        name: Option<String>,
        error: StockError,
    ) -> Self {
        Self {
            product_id,
            code,
            name,
            status: ValidationStatus::Error,
            comparison: None,
            error: Some(error),
        }
    }

    pub fn difference(&self) -> Option<Decimal> {
        self.comparison.as_ref().map(|c| c.difference)
    }
}

/// Largest signed difference and where it was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferenceExtreme {
    pub product_id: ProductId,
    pub difference: Decimal,
}

/// Result of a validation batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub run_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub threshold: Decimal,
    pub entries: Vec<ValidationEntry>,
    pub total: usize,
    pub matches: usize,
    pub discrepancy_count: usize,
    pub error_count: usize,
    /// `matches / total × 100`; 100 for an empty batch.
    pub accuracy: Decimal,
    pub largest_positive: Option<DifferenceExtreme>,
    pub largest_negative: Option<DifferenceExtreme>,
    pub unclassified_movements: usize,
}

impl ValidationReport {
    /// Reduce classified entries into the aggregate figures.
    pub fn aggregate(
        run_id: Uuid,
        evaluated_at: DateTime<Utc>,
        threshold: Decimal,
        entries: Vec<ValidationEntry>,
    ) -> Self {
        let total = entries.len();
        let mut matches = 0;
        let mut discrepancy_count = 0;
        let mut error_count = 0;
        let mut unclassified_movements = 0;
        let mut largest_positive: Option<DifferenceExtreme> = None;
        let mut largest_negative: Option<DifferenceExtreme> = None;

        for entry in &entries {
            match entry.status {
                ValidationStatus::Match => matches += 1,
                ValidationStatus::Discrepancy => discrepancy_count += 1,
                ValidationStatus::Error => error_count += 1,
            }

            let Some(comparison) = &entry.comparison else {
                continue;
            };
            unclassified_movements += comparison.unclassified_movements;

            let candidate = DifferenceExtreme {
                product_id: entry.product_id,
                difference: comparison.difference,
            };
            if comparison.difference > Decimal::ZERO
                && largest_positive.is_none_or(|cur| comparison.difference > cur.difference)
            {
                largest_positive = Some(candidate);
            }
            if comparison.difference < Decimal::ZERO
                && largest_negative.is_none_or(|cur| comparison.difference < cur.difference)
            {
                largest_negative = Some(candidate);
            }
        }

        let accuracy = if total == 0 {
            HUNDRED
        } else {
            round_pct(Decimal::from(matches) / Decimal::from(total) * HUNDRED)
        };

        Self {
            run_id,
            evaluated_at,
            threshold,
            entries,
            total,
            matches,
            discrepancy_count,
            error_count,
            accuracy,
            largest_positive,
            largest_negative,
            unclassified_movements,
        }
    }

    pub fn discrepancies(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries.iter().filter(|e| e.status == ValidationStatus::Discrepancy)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries.iter().filter(|e| e.status == ValidationStatus::Error)
    }

    pub fn entry(&self, product_id: ProductId) -> Option<&ValidationEntry> {
        self.entries.iter().find(|e| e.product_id == product_id)
    }
}

/// Kind of a heuristic recommendation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    LowAccuracy,
    NegativeComputedStock,
    NegativeStoredStock,
    ComputationErrors,
    UnclassifiedMovements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
}

/// Thresholds behind the recommendation heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationPolicy {
    /// Accuracy (percent) below which the report flags the batch.
    pub accuracy_warning: Decimal,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            accuracy_warning: Decimal::from(95),
        }
    }
}

/// Validation report with distribution statistics and recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedValidationReport {
    #[serde(flatten)]
    pub report: ValidationReport,
    /// Mean signed difference over non-error entries.
    pub average_difference: Option<Decimal>,
    /// Median signed difference over non-error entries.
    pub median_difference: Option<Decimal>,
    pub zero_computed: usize,
    pub negative_computed: usize,
    pub zero_stored: usize,
    pub negative_stored: usize,
    /// Sum of `|value_difference|` over discrepancies.
    pub value_at_risk: Decimal,
    pub recommendations: Vec<Recommendation>,
}

impl ExtendedValidationReport {
    pub fn from_report(report: ValidationReport, policy: &RecommendationPolicy) -> Self {
        let comparisons: Vec<&StockComparison> =
            report.entries.iter().filter_map(|e| e.comparison.as_ref()).collect();

        let mut differences: Vec<Decimal> = comparisons.iter().map(|c| c.difference).collect();
        differences.sort();

        let average_difference = if differences.is_empty() {
            None
        } else {
            let sum = differences.iter().fold(Decimal::ZERO, |acc, d| acc.saturating_add(*d));
            Some((sum / Decimal::from(differences.len())).round_dp(4))
        };
        let median_difference = median(&differences);

        let zero_computed = comparisons.iter().filter(|c| c.computed.is_zero()).count();
        let negative_computed = comparisons.iter().filter(|c| c.computed < Decimal::ZERO).count();
        let zero_stored = comparisons.iter().filter(|c| c.stored.is_zero()).count();
        let negative_stored = comparisons.iter().filter(|c| c.stored < Decimal::ZERO).count();

        let value_at_risk = report
            .discrepancies()
            .filter_map(|e| e.comparison.as_ref())
            .map(|c| c.value_difference.abs())
            .fold(Decimal::ZERO, Decimal::saturating_add);

        let mut extended = Self {
            report,
            average_difference,
            median_difference,
            zero_computed,
            negative_computed,
            zero_stored,
            negative_stored,
            value_at_risk,
            recommendations: Vec::new(),
        };
        extended.recommendations = extended.recommend(policy);
        extended
    }

    fn recommend(&self, policy: &RecommendationPolicy) -> Vec<Recommendation> {
        let report = &self.report;
        let mut out = Vec::new();

        if report.total > 0 && report.accuracy < policy.accuracy_warning {
            out.push(Recommendation {
                kind: RecommendationKind::LowAccuracy,
                message: format!(
                    "accuracy {}% is below {}%; review the {} discrepant product(s) before trusting stored stock",
                    report.accuracy, policy.accuracy_warning, report.discrepancy_count
                ),
            });
        }
        if self.negative_computed > 0 {
            out.push(Recommendation {
                kind: RecommendationKind::NegativeComputedStock,
                message: format!(
                    "{} product(s) replay to negative stock; check for missing entries or a stale checkpoint",
                    self.negative_computed
                ),
            });
        }
        if self.negative_stored > 0 {
            out.push(Recommendation {
                kind: RecommendationKind::NegativeStoredStock,
                message: format!("{} product(s) store a negative current stock", self.negative_stored),
            });
        }
        if report.error_count > 0 {
            out.push(Recommendation {
                kind: RecommendationKind::ComputationErrors,
                message: format!("{} product(s) could not be computed; see entry errors", report.error_count),
            });
        }
        if report.unclassified_movements > 0 {
            out.push(Recommendation {
                kind: RecommendationKind::UnclassifiedMovements,
                message: format!(
                    "{} unclassified movement(s) were excluded from replay; classify them at ingestion",
                    report.unclassified_movements
                ),
            });
        }

        out
    }

    pub fn has(&self, kind: RecommendationKind) -> bool {
        self.recommendations.iter().any(|r| r.kind == kind)
    }
}

fn median(sorted: &[Decimal]) -> Option<Decimal> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some(sorted[n / 2 - 1].saturating_add(sorted[n / 2]) / Decimal::TWO)
    }
}

fn round_pct(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use stockledger_core::ErrorKind;

    fn product(id: i64, stored: Decimal) -> Product {
        Product::new(ProductId::new(id), format!("P-{id}"), format!("Product {id}"), true, stored, dec!(10)).unwrap()
    }

    fn computed(q: Decimal) -> StockResult<ComputedStock> {
        Ok(ComputedStock { quantity: q, unclassified: 0 })
    }

    fn report(entries: Vec<ValidationEntry>) -> ValidationReport {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        ValidationReport::aggregate(Uuid::nil(), at, Decimal::ZERO, entries)
    }

    #[test]
    fn percentage_uses_stored_denominator() {
        let c = StockComparison::new(ComputedStock { quantity: dec!(75), unclassified: 0 }, dec!(50), dec!(2)).unwrap();
        assert_eq!(c.difference, dec!(25));
        assert_eq!(c.percentage_diff, dec!(50));
        assert_eq!(c.value_difference, dec!(50));
    }

    #[test]
    fn zero_stored_is_treated_as_one() {
        let c = StockComparison::new(ComputedStock { quantity: dec!(3), unclassified: 0 }, dec!(0), dec!(1)).unwrap();
        assert_eq!(c.percentage_diff, dec!(300));
    }

    #[test]
    fn overflowing_comparison_is_an_error_entry() {
        let p = product(1, Decimal::MIN);
        let e = ValidationEntry::classify(p.id_typed(), Some(&p), computed(Decimal::MAX), Decimal::ZERO);
        assert_eq!(e.status, ValidationStatus::Error);
        assert_eq!(e.error.as_ref().map(|err| err.kind()), Some(ErrorKind::Computation));
    }

    #[test]
    fn threshold_is_absolute_tolerance() {
        let p = product(1, dec!(10));
        let e = ValidationEntry::classify(p.id_typed(), Some(&p), computed(dec!(10.4)), dec!(0.5));
        assert_eq!(e.status, ValidationStatus::Match);
        let e = ValidationEntry::classify(p.id_typed(), Some(&p), computed(dec!(9.4)), dec!(0.5));
        assert_eq!(e.status, ValidationStatus::Discrepancy);
    }

    #[test]
    fn failed_computation_becomes_error_entry() {
        let p = product(1, dec!(10));
        let e = ValidationEntry::classify(p.id_typed(), Some(&p), Err(StockError::computation("boom")), Decimal::ZERO);
        assert_eq!(e.status, ValidationStatus::Error);
        assert!(e.comparison.is_none());
        assert_eq!(e.code.as_deref(), Some("P-1"));
    }

    #[test]
    fn missing_product_becomes_not_found_entry() {
        let e = ValidationEntry::classify(ProductId::new(8), None, computed(dec!(1)), Decimal::ZERO);
        assert_eq!(e.status, ValidationStatus::Error);
        assert_eq!(e.error, Some(StockError::not_found(ProductId::new(8))));
    }

    #[test]
    fn aggregates_accuracy_and_extremes() {
        let a = product(1, dec!(100));
        let b = product(2, dec!(50));
        let c = product(3, dec!(40));
        let r = report(vec![
            ValidationEntry::classify(a.id_typed(), Some(&a), computed(dec!(100)), Decimal::ZERO),
            ValidationEntry::classify(b.id_typed(), Some(&b), computed(dec!(75)), Decimal::ZERO),
            ValidationEntry::classify(c.id_typed(), Some(&c), computed(dec!(30)), Decimal::ZERO),
            ValidationEntry::classify(ProductId::new(4), None, Err(StockError::computation("x")), Decimal::ZERO),
        ]);

        assert_eq!(r.total, 4);
        assert_eq!(r.matches, 1);
        assert_eq!(r.discrepancy_count, 2);
        assert_eq!(r.error_count, 1);
        assert_eq!(r.accuracy, dec!(25));
        assert_eq!(r.largest_positive.unwrap().difference, dec!(25));
        assert_eq!(r.largest_positive.unwrap().product_id, ProductId::new(2));
        assert_eq!(r.largest_negative.unwrap().difference, dec!(-10));
        assert_eq!(r.discrepancies().count(), 2);
        assert_eq!(r.errors().count(), 1);
    }

    #[test]
    fn empty_batch_is_fully_accurate() {
        let r = report(vec![]);
        assert_eq!(r.accuracy, dec!(100));
        assert!(r.largest_positive.is_none());

        let ext = ExtendedValidationReport::from_report(r, &RecommendationPolicy::default());
        assert!(ext.average_difference.is_none());
        assert!(ext.median_difference.is_none());
        assert!(ext.recommendations.is_empty());
    }

    #[test]
    fn extended_statistics_and_recommendations() {
        let entries = vec![
            (product(1, dec!(0)), dec!(0)),
            (product(2, dec!(10)), dec!(-4)),
            (product(3, dec!(-2)), dec!(6)),
            (product(4, dec!(5)), dec!(5)),
        ]
        .into_iter()
        .map(|(p, q)| ValidationEntry::classify(p.id_typed(), Some(&p), computed(q), Decimal::ZERO))
        .collect();

        let ext = ExtendedValidationReport::from_report(report(entries), &RecommendationPolicy::default());

        // differences: 0, -14, 8, 0 → sorted -14, 0, 0, 8
        assert_eq!(ext.average_difference, Some(dec!(-1.5)));
        assert_eq!(ext.median_difference, Some(dec!(0)));
        assert_eq!(ext.zero_computed, 1);
        assert_eq!(ext.negative_computed, 1);
        assert_eq!(ext.zero_stored, 1);
        assert_eq!(ext.negative_stored, 1);
        assert_eq!(ext.value_at_risk, dec!(220));
        assert!(ext.has(RecommendationKind::LowAccuracy));
        assert!(ext.has(RecommendationKind::NegativeComputedStock));
        assert!(ext.has(RecommendationKind::NegativeStoredStock));
        assert!(!ext.has(RecommendationKind::ComputationErrors));
    }

    #[test]
    fn extended_report_serializes_flat() {
        let ext = ExtendedValidationReport::from_report(report(vec![]), &RecommendationPolicy::default());
        let json = serde_json::to_value(&ext).unwrap();
        assert!(json.get("accuracy").is_some());
        assert!(json.get("recommendations").is_some());
    }
}
