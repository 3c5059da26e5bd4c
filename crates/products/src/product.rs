use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, ProductId, StockError};

/// Catalog product as seen by stock reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    code: String,
    name: String,
    active: bool,
    /// Denormalized stock figure maintained by the catalog's own write path.
    current_stock: Decimal,
    unit_cost: Decimal,
}

impl Product {
    /// Build a product record, validating the fields the catalog guarantees.
    pub fn new(
        id: ProductId,
        code: impl Into<String>,
        name: impl Into<String>,
        active: bool,
        current_stock: Decimal,
        unit_cost: Decimal,
    ) -> Result<Self, StockError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(StockError::invalid_input("product code cannot be empty"));
        }
        if unit_cost.is_sign_negative() && !unit_cost.is_zero() {
            return Err(StockError::invalid_input("unit cost cannot be negative"));
        }

        Ok(Self {
            id,
            code,
            name: name.into(),
            active,
            current_stock,
            unit_cost,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_stock(&self) -> Decimal {
        self.current_stock
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    /// Stored stock valued at unit cost.
    pub fn stock_value(&self) -> Decimal {
        self.current_stock * self.unit_cost
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Selection criteria for active catalog products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Only products whose code starts with this prefix (case-insensitive).
    pub code_prefix: Option<String>,
    /// Only products whose name contains this fragment (case-insensitive).
    pub name_contains: Option<String>,
    /// Cap on the number of products returned, applied after ordering by id.
    pub limit: Option<usize>,
}

impl ProductFilter {
    pub fn with_code_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.code_prefix = Some(prefix.into());
        self
    }

    pub fn with_name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a product passes this filter. Inactive products never match.
    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_active() {
            return false;
        }
        if let Some(prefix) = &self.code_prefix {
            if !product.code.to_lowercase().starts_with(&prefix.to_lowercase()) {
                return false;
            }
        }
        if let Some(fragment) = &self.name_contains {
            if !product.name.to_lowercase().contains(&fragment.to_lowercase()) {
                return false;
            }
        }
        true
    }
}
