//! Runtime configuration, read from environment variables.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `DATABASE_URL` | Postgres connection string | unset |
//! | `STOCKLEDGER_DISCREPANCY_THRESHOLD` | absolute tolerance for a `match` | `0` |
//! | `STOCKLEDGER_ACCURACY_WARNING` | accuracy (%) below which a report warns | `95` |
//! | `STOCKLEDGER_VALIDATION_WORKERS` | validation worker threads | available parallelism |
//! | `STOCKLEDGER_VALIDATION_LIMIT` | max products per validation run | unlimited |
//! | `STOCKLEDGER_BACKWARD_POLICY` | `stop` or `continue` | `stop` |

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_inventory::{BackwardPolicy, RecommendationPolicy};

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DISCREPANCY_THRESHOLD: &str = "STOCKLEDGER_DISCREPANCY_THRESHOLD";
pub const ENV_ACCURACY_WARNING: &str = "STOCKLEDGER_ACCURACY_WARNING";
pub const ENV_VALIDATION_WORKERS: &str = "STOCKLEDGER_VALIDATION_WORKERS";
pub const ENV_VALIDATION_LIMIT: &str = "STOCKLEDGER_VALIDATION_LIMIT";
pub const ENV_BACKWARD_POLICY: &str = "STOCKLEDGER_BACKWARD_POLICY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockConfig {
    pub database_url: Option<String>,
    pub discrepancy_threshold: Decimal,
    pub accuracy_warning: Decimal,
    pub validation_workers: usize,
    pub validation_limit: Option<usize>,
    pub backward_policy: BackwardPolicy,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            discrepancy_threshold: Decimal::ZERO,
            accuracy_warning: RecommendationPolicy::default().accuracy_warning,
            validation_workers: default_workers(),
            validation_limit: None,
            backward_policy: BackwardPolicy::default(),
        }
    }
}

impl StockConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key/value source. Unset or blank keys take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        config.database_url = get(ENV_DATABASE_URL);

        if let Some(raw) = get(ENV_DISCREPANCY_THRESHOLD) {
            let threshold: Decimal = parse(ENV_DISCREPANCY_THRESHOLD, &raw)?;
            if threshold.is_sign_negative() {
                return Err(invalid(ENV_DISCREPANCY_THRESHOLD, &raw, "must not be negative"));
            }
            config.discrepancy_threshold = threshold;
        }

        if let Some(raw) = get(ENV_ACCURACY_WARNING) {
            let pct: Decimal = parse(ENV_ACCURACY_WARNING, &raw)?;
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(invalid(ENV_ACCURACY_WARNING, &raw, "must be between 0 and 100"));
            }
            config.accuracy_warning = pct;
        }

        if let Some(raw) = get(ENV_VALIDATION_WORKERS) {
            let workers: usize = parse(ENV_VALIDATION_WORKERS, &raw)?;
            if workers == 0 {
                return Err(invalid(ENV_VALIDATION_WORKERS, &raw, "must be at least 1"));
            }
            config.validation_workers = workers;
        }

        if let Some(raw) = get(ENV_VALIDATION_LIMIT) {
            config.validation_limit = Some(parse(ENV_VALIDATION_LIMIT, &raw)?);
        }

        if let Some(raw) = get(ENV_BACKWARD_POLICY) {
            config.backward_policy = match raw.to_ascii_lowercase().as_str() {
                "stop" | "stop_at_checkpoint" => BackwardPolicy::StopAtCheckpoint,
                "continue" | "continue_through" => BackwardPolicy::ContinueThrough,
                _ => return Err(invalid(ENV_BACKWARD_POLICY, &raw, "expected `stop` or `continue`")),
            };
        }

        Ok(config)
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or(ConfigError::Missing(ENV_DATABASE_URL))
    }

    pub fn recommendation_policy(&self) -> RecommendationPolicy {
        RecommendationPolicy {
            accuracy_warning: self.accuracy_warning,
        }
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_discrepancy_threshold(mut self, threshold: Decimal) -> Self {
        self.discrepancy_threshold = threshold;
        self
    }

    pub fn with_accuracy_warning(mut self, pct: Decimal) -> Self {
        self.accuracy_warning = pct;
        self
    }

    pub fn with_validation_workers(mut self, workers: usize) -> Self {
        self.validation_workers = workers.max(1);
        self
    }

    pub fn with_validation_limit(mut self, limit: usize) -> Self {
        self.validation_limit = Some(limit);
        self
    }

    pub fn with_backward_policy(mut self, policy: BackwardPolicy) -> Self {
        self.backward_policy = policy;
        self
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| invalid(var, raw, &e.to_string()))
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
