use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::{
    AddressValidationResponse, CreateOrderRequest, FixedQuoteResponse, FloatingQuoteResponse,
};
use crate::domain::{CurrencyInfo, Order, OrderStatus, Pair};
use crate::error::Result;

/// Abstract contract of the exchange-aggregator API.
///
/// The aggregator owns the hard parts (rate locking, KYC, settlement); this
/// trait is the seam that lets the services run against a test double.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn get_currencies(&self) -> Result<Vec<String>>;

    async fn get_currencies_full(&self) -> Result<Vec<CurrencyInfo>>;

    async fn get_pairs(&self, from: Option<&str>, to: Option<&str>) -> Result<Vec<Pair>>;

    async fn estimate_floating(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<FloatingQuoteResponse>;

    async fn estimate_fixed(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<FixedQuoteResponse>;

    async fn validate_address(
        &self,
        currency: &str,
        address: &str,
    ) -> Result<AddressValidationResponse>;

    /// One call per user action; callers decide how to surface transport
    /// failures (the outcome upstream is unknown).
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order>;

    /// Fixed-rate creation endpoint; the request must carry a live rate id.
    async fn create_fixed_order(&self, request: &CreateOrderRequest) -> Result<Order>;

    async fn get_status(&self, id: &str) -> Result<OrderStatus>;

    async fn search_orders(&self, payout_address: &str) -> Result<Vec<Order>>;
}
