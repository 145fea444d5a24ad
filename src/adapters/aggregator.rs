//! HTTP adapter for the exchange-aggregator REST API.
//!
//! Every endpoint answers with a `{result, error}` envelope; `result` carries
//! the payload and `error` a human-readable rejection. Amount-bound
//! rejections and expired fixed-rate quotes are recognized here so callers
//! get typed errors instead of string matching.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{
    AddressValidationResponse, CreateOrderRequest, FixedQuoteResponse, FloatingQuoteResponse,
};
use crate::domain::{CurrencyInfo, Order, OrderStatus, Pair};
use crate::error::{Result, SwapError};
use crate::exchange::ExchangeApi;

#[derive(Clone)]
pub struct AggregatorClient {
    http: Client,
    base_url: String,
}

/// A completed HTTP exchange: either a payload or the exchange's rejection
/// message. Transport failures never reach this type.
enum CallOutcome {
    Ok(Value),
    Rejected(String),
}

impl AggregatorClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent("swapdeck/0.1")
            .timeout(request_timeout)
            .build()
            .map_err(|e| SwapError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: Value) -> Result<CallOutcome> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {} {}", url, body);

        let resp = self.http.post(&url).json(&body).send().await?;
        Self::unwrap_envelope(path, resp).await
    }

    async fn get(&self, path: &str) -> Result<CallOutcome> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);

        let resp = self.http.get(&url).send().await?;
        Self::unwrap_envelope(path, resp).await
    }

    async fn unwrap_envelope(path: &str, resp: reqwest::Response) -> Result<CallOutcome> {
        let status = resp.status();
        let text = resp.text().await?;

        if status.as_u16() == 429 {
            return Err(SwapError::RateLimited(format!(
                "aggregator rate limited on {}",
                path
            )));
        }

        let parsed: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(SwapError::Internal(format!(
                    "aggregator {} failed: status={} body={}",
                    path, status, text
                )));
            }
            Err(e) => {
                return Err(SwapError::Internal(format!(
                    "invalid aggregator JSON on {}: {}",
                    path, e
                )));
            }
        };

        if let Some(error) = parsed.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    error
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string())
                });
            if !message.is_empty() && message != "null" {
                return Ok(CallOutcome::Rejected(message));
            }
        }

        if !status.is_success() {
            return Err(SwapError::Internal(format!(
                "aggregator {} failed: status={} body={}",
                path, status, text
            )));
        }

        match parsed.get("result") {
            Some(result) => Ok(CallOutcome::Ok(result.clone())),
            None => Ok(CallOutcome::Ok(parsed)),
        }
    }

    /// First element of an envelope result that may be `[payload]` or
    /// `payload`.
    fn first_element(result: Value) -> Value {
        match result {
            Value::Array(mut items) if !items.is_empty() => items.remove(0),
            other => other,
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(path: &str, value: Value) -> Result<T> {
        serde_json::from_value(value)
            .map_err(|e| SwapError::Internal(format!("unexpected {} payload: {}", path, e)))
    }
}

/// Normalize the exchange's amount-bound rejections ("Minimal amount is
/// 0.001 BTC" / "Maximum amount is 5 BTC") into the precise message the form
/// shows, or None for anything else.
pub(crate) fn parse_bounds_message(message: &str) -> Option<String> {
    let lower = message.to_lowercase();

    let (label, marker) = if let Some(idx) = lower.find("minimal amount is") {
        ("MINIMUM", idx + "minimal amount is".len())
    } else if let Some(idx) = lower.find("minimum amount is") {
        ("MINIMUM", idx + "minimum amount is".len())
    } else if let Some(idx) = lower.find("maximum amount is") {
        ("MAXIMUM", idx + "maximum amount is".len())
    } else {
        return None;
    };

    let mut rest = lower[marker..].split_whitespace();
    let amount = rest.next()?;
    amount.trim_end_matches('.').parse::<f64>().ok()?;
    let asset = rest.next()?.trim_end_matches(['.', ',']);

    Some(format!(
        "{} AMOUNT IS {} {}",
        label,
        amount.trim_end_matches('.'),
        asset.to_uppercase()
    ))
}

/// `getStatus` payload: some deployments answer with the bare status string,
/// others with the full order record. Anything else is an error; inventing a
/// status here would feed the poller a fake transition and regress the
/// stored one.
fn status_from_payload(result: &Value) -> Result<OrderStatus> {
    let raw = match result {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SwapError::Internal(format!("getStatus record without status: {}", result))
            })?,
        other => {
            return Err(SwapError::Internal(format!(
                "unexpected getStatus payload: {}",
                other
            )))
        }
    };
    Ok(OrderStatus::parse(raw))
}

/// Estimate rejections: bound violations become field-level validation
/// errors, the rest are quote errors.
fn classify_quote_rejection(message: String) -> SwapError {
    match parse_bounds_message(&message) {
        Some(normalized) => SwapError::Validation(normalized),
        None => SwapError::Quote(message),
    }
}

/// Creation rejections: an expired or unknown rate id means the caller must
/// re-estimate, everything else is terminal for the attempt.
fn classify_creation_rejection(message: String) -> SwapError {
    let lower = message.to_lowercase();
    let mentions_rate = lower.contains("rate") || lower.contains("rateid");
    let stale = lower.contains("expire")
        || lower.contains("not found")
        || lower.contains("not exist")
        || lower.contains("invalid");

    if mentions_rate && stale {
        SwapError::StaleQuote(message)
    } else {
        SwapError::OrderCreation(message)
    }
}

#[async_trait]
impl ExchangeApi for AggregatorClient {
    async fn get_currencies(&self) -> Result<Vec<String>> {
        match self.get("currencies").await? {
            CallOutcome::Ok(result) => Self::decode("currencies", result),
            CallOutcome::Rejected(msg) => Err(SwapError::Internal(msg)),
        }
    }

    async fn get_currencies_full(&self) -> Result<Vec<CurrencyInfo>> {
        match self.get("getCurrenciesFull").await? {
            CallOutcome::Ok(result) => Self::decode("getCurrenciesFull", result),
            CallOutcome::Rejected(msg) => Err(SwapError::Internal(msg)),
        }
    }

    async fn get_pairs(&self, from: Option<&str>, to: Option<&str>) -> Result<Vec<Pair>> {
        let mut body = serde_json::Map::new();
        if let Some(from) = from {
            body.insert("from".into(), json!(from));
        }
        if let Some(to) = to {
            body.insert("to".into(), json!(to));
        }

        match self.post("getPairs", Value::Object(body)).await? {
            CallOutcome::Ok(result) => Self::decode("getPairs", result),
            CallOutcome::Rejected(msg) => Err(SwapError::Internal(msg)),
        }
    }

    async fn estimate_floating(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<FloatingQuoteResponse> {
        let body = json!({ "from": from, "to": to, "amountFrom": amount });
        match self.post("estimateFloatingRate", body).await? {
            CallOutcome::Ok(result) => {
                Self::decode("estimateFloatingRate", Self::first_element(result))
            }
            CallOutcome::Rejected(msg) => Err(classify_quote_rejection(msg)),
        }
    }

    async fn estimate_fixed(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<FixedQuoteResponse> {
        let body = json!({ "from": from, "to": to, "amountFrom": amount });
        match self.post("estimateFixedRate", body).await? {
            CallOutcome::Ok(result) => {
                Self::decode("estimateFixedRate", Self::first_element(result))
            }
            CallOutcome::Rejected(msg) => Err(classify_quote_rejection(msg)),
        }
    }

    async fn validate_address(
        &self,
        currency: &str,
        address: &str,
    ) -> Result<AddressValidationResponse> {
        let body = json!({ "currency": currency, "address": address });
        match self.post("validateAddress", body).await? {
            CallOutcome::Ok(result) => Self::decode("validateAddress", result),
            CallOutcome::Rejected(msg) => Ok(AddressValidationResponse {
                result: false,
                message: Some(msg),
            }),
        }
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order> {
        let body = serde_json::to_value(request)?;
        match self.post("createTransaction", body).await? {
            CallOutcome::Ok(result) => Self::decode("createTransaction", result),
            CallOutcome::Rejected(msg) => Err(classify_creation_rejection(msg)),
        }
    }

    async fn create_fixed_order(&self, request: &CreateOrderRequest) -> Result<Order> {
        let body = serde_json::to_value(request)?;
        match self.post("createFixTransaction", body).await? {
            CallOutcome::Ok(result) => Self::decode("createFixTransaction", result),
            CallOutcome::Rejected(msg) => Err(classify_creation_rejection(msg)),
        }
    }

    async fn get_status(&self, id: &str) -> Result<OrderStatus> {
        let body = json!({ "id": id });
        match self.post("getStatus", body).await? {
            CallOutcome::Ok(result) => status_from_payload(&result),
            CallOutcome::Rejected(msg) => Err(SwapError::Internal(msg)),
        }
    }

    async fn search_orders(&self, payout_address: &str) -> Result<Vec<Order>> {
        let body = json!({ "payoutAddress": payout_address });
        match self.post("searchTransactions", body).await? {
            CallOutcome::Ok(result) => Self::decode("searchTransactions", result),
            CallOutcome::Rejected(msg) => Err(SwapError::Internal(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounds_message_min() {
        assert_eq!(
            parse_bounds_message("Minimal amount is 0.001 btc").as_deref(),
            Some("MINIMUM AMOUNT IS 0.001 BTC")
        );
    }

    #[test]
    fn test_parse_bounds_message_max() {
        assert_eq!(
            parse_bounds_message("Maximum amount is 5.2 ETH.").as_deref(),
            Some("MAXIMUM AMOUNT IS 5.2 ETH")
        );
    }

    #[test]
    fn test_parse_bounds_message_passthrough() {
        assert!(parse_bounds_message("pair is temporarily disabled").is_none());
    }

    #[test]
    fn test_creation_rejection_classifies_stale_rate() {
        let err = classify_creation_rejection("rateId expired".to_string());
        assert!(matches!(err, SwapError::StaleQuote(_)));

        let err = classify_creation_rejection("insufficient reserve".to_string());
        assert!(matches!(err, SwapError::OrderCreation(_)));
    }

    #[test]
    fn test_status_payload_accepts_string_and_record() {
        use crate::domain::OrderStatus;
        use serde_json::json;

        assert_eq!(
            status_from_payload(&json!("confirming")).unwrap(),
            OrderStatus::Confirming
        );
        assert_eq!(
            status_from_payload(&json!({ "id": "abc123", "status": "exchanging" })).unwrap(),
            OrderStatus::Exchanging
        );
    }

    #[test]
    fn test_status_payload_without_status_field_is_an_error() {
        use serde_json::json;

        // a fabricated default here would look like a real transition and
        // overwrite the stored status
        assert!(matches!(
            status_from_payload(&json!({ "id": "abc123" })),
            Err(SwapError::Internal(_))
        ));
        assert!(matches!(
            status_from_payload(&json!(42)),
            Err(SwapError::Internal(_))
        ));
    }

    #[test]
    fn test_quote_rejection_promotes_bounds_to_validation() {
        let err = classify_quote_rejection("Minimal amount is 0.1 xmr".to_string());
        match err {
            SwapError::Validation(msg) => assert_eq!(msg, "MINIMUM AMOUNT IS 0.1 XMR"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
