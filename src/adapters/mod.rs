pub mod aggregator;

pub use aggregator::AggregatorClient;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Floating-rate estimate payload; no quote identifier persists.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatingQuoteResponse {
    pub amount_to: Decimal,
    #[serde(default)]
    pub network_fee: Decimal,
}

/// Fixed-rate estimate payload; the rate id references a locked quote that
/// expires upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedQuoteResponse {
    #[serde(alias = "id")]
    pub rate_id: String,
    pub amount_to: Decimal,
    #[serde(default)]
    pub network_fee: Decimal,
    #[serde(alias = "minFrom")]
    pub min: Decimal,
    #[serde(alias = "maxFrom")]
    pub max: Decimal,
}

/// Address validation verdict from the exchange
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressValidationResponse {
    pub result: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Order creation request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_id: Option<String>,
}
