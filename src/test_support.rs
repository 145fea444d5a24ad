//! Scripted `ExchangeApi` double for unit tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::adapters::{
    AddressValidationResponse, CreateOrderRequest, FixedQuoteResponse, FloatingQuoteResponse,
};
use crate::domain::{CurrencyInfo, Order, OrderStatus, Pair};
use crate::error::{Result, SwapError};
use crate::exchange::ExchangeApi;

/// One scripted reply: an optional artificial latency and an outcome.
pub struct ScriptItem<T> {
    pub delay_ms: u64,
    pub outcome: Outcome<T>,
}

impl<T> ScriptItem<T> {
    pub fn ok(value: T) -> Self {
        Self {
            delay_ms: 0,
            outcome: Outcome::Ok(value),
        }
    }

    pub fn ok_after(delay_ms: u64, value: T) -> Self {
        Self {
            delay_ms,
            outcome: Outcome::Ok(value),
        }
    }

    pub fn network_error() -> Self {
        Self {
            delay_ms: 0,
            outcome: Outcome::Network,
        }
    }

    pub fn stale(message: &str) -> Self {
        Self {
            delay_ms: 0,
            outcome: Outcome::Stale(message.to_string()),
        }
    }

    pub fn rejected(message: &str) -> Self {
        Self {
            delay_ms: 0,
            outcome: Outcome::Rejected(message.to_string()),
        }
    }
}

pub enum Outcome<T> {
    Ok(T),
    /// Transport-level failure (retryable).
    Network,
    /// Expired/unknown fixed-rate id.
    Stale(String),
    /// Semantic rejection from the exchange.
    Rejected(String),
}

impl<T> Outcome<T> {
    fn into_result(self, reject: fn(String) -> SwapError) -> Result<T> {
        match self {
            Outcome::Ok(value) => Ok(value),
            Outcome::Network => Err(SwapError::RateLimited("scripted network failure".into())),
            Outcome::Stale(msg) => Err(SwapError::StaleQuote(msg)),
            Outcome::Rejected(msg) => Err(reject(msg)),
        }
    }
}

#[derive(Default)]
pub struct ScriptedExchange {
    pub floating: Mutex<VecDeque<ScriptItem<FloatingQuoteResponse>>>,
    pub fixed: Mutex<VecDeque<ScriptItem<FixedQuoteResponse>>>,
    pub validations: Mutex<VecDeque<ScriptItem<AddressValidationResponse>>>,
    pub creations: Mutex<VecDeque<ScriptItem<Order>>>,
    pub statuses: Mutex<HashMap<String, VecDeque<ScriptItem<String>>>>,
    pub pairs: Mutex<Vec<Pair>>,
    pub search_results: Mutex<Vec<Order>>,

    pub estimate_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub status_calls: AtomicUsize,

    /// Addresses passed to validate_address, in call order.
    pub validated_addresses: Mutex<Vec<String>>,
    /// Creation requests received, in call order.
    pub created_requests: Mutex<Vec<CreateOrderRequest>>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    async fn play<T>(item: ScriptItem<T>, reject: fn(String) -> SwapError) -> Result<T> {
        if item.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(item.delay_ms)).await;
        }
        item.outcome.into_result(reject)
    }
}

#[async_trait]
impl ExchangeApi for ScriptedExchange {
    async fn get_currencies(&self) -> Result<Vec<String>> {
        Ok(vec!["btc".into(), "eth".into(), "xmr".into()])
    }

    async fn get_currencies_full(&self) -> Result<Vec<CurrencyInfo>> {
        Ok(Vec::new())
    }

    async fn get_pairs(&self, _from: Option<&str>, _to: Option<&str>) -> Result<Vec<Pair>> {
        Ok(self.pairs.lock().unwrap().clone())
    }

    async fn estimate_floating(
        &self,
        _from: &str,
        _to: &str,
        _amount: Decimal,
    ) -> Result<FloatingQuoteResponse> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        let item = self
            .floating
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted floating quote left");
        Self::play(item, SwapError::Quote).await
    }

    async fn estimate_fixed(
        &self,
        _from: &str,
        _to: &str,
        _amount: Decimal,
    ) -> Result<FixedQuoteResponse> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        let item = self
            .fixed
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted fixed quote left");
        Self::play(item, SwapError::Quote).await
    }

    async fn validate_address(
        &self,
        _currency: &str,
        address: &str,
    ) -> Result<AddressValidationResponse> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validated_addresses
            .lock()
            .unwrap()
            .push(address.to_string());
        let item = self
            .validations
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted validation left");
        Self::play(item, SwapError::Validation).await
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.created_requests.lock().unwrap().push(request.clone());
        let item = self
            .creations
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted creation left");
        Self::play(item, SwapError::OrderCreation).await
    }

    async fn create_fixed_order(&self, request: &CreateOrderRequest) -> Result<Order> {
        self.create_order(request).await
    }

    async fn get_status(&self, id: &str) -> Result<OrderStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let item = self
            .statuses
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("no scripted status left for {id}"));
        Self::play(item, SwapError::Internal)
            .await
            .map(|raw| OrderStatus::parse(&raw))
    }

    async fn search_orders(&self, _payout_address: &str) -> Result<Vec<Order>> {
        Ok(self.search_results.lock().unwrap().clone())
    }
}

/// A plausible order record for tests.
pub fn sample_order(id: &str, status: OrderStatus) -> Order {
    use rust_decimal_macros::dec;

    Order {
        id: id.to_string(),
        currency_from: "btc".to_string(),
        currency_to: "eth".to_string(),
        amount_expected_from: dec!(0.5),
        amount_expected_to: dec!(7.2),
        payin_address: "bc1qpayin".to_string(),
        payout_address: "0xpayout".to_string(),
        refund_address: None,
        rate_type: crate::domain::RateType::Floating,
        rate_id: None,
        status,
        created_at: chrono::Utc::now(),
        track_url: None,
    }
}
