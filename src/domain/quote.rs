use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RateType;

/// Allowed amount range for a fixed-rate quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Decimal,
    pub max: Decimal,
}

impl Bounds {
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min && amount <= self.max
    }
}

/// Inputs for one rate estimation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimateRequest {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub rate_type: RateType,
}

impl EstimateRequest {
    /// Same route and amount, regardless of when the estimate was taken.
    pub fn same_inputs(&self, other: &EstimateRequest) -> bool {
        self == other
    }
}

/// A completed estimate with the fee breakdown the user sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Estimate {
    pub request: EstimateRequest,
    /// Quoted gross amount, before any fees.
    pub amount_to: Decimal,
    pub network_fee: Decimal,
    pub exchange_fee: Decimal,
    /// amount_to - network_fee - exchange_fee, truncated to 8 dp.
    pub receive_amount: Decimal,
    /// Present for fixed-rate quotes only; expires upstream.
    pub rate_id: Option<String>,
    pub bounds: Option<Bounds>,
    pub taken_at: DateTime<Utc>,
}

impl Estimate {
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.taken_at
    }
}
