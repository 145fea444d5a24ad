//! Order creation. Exactly one upstream call per user action: a failed
//! attempt is reported, never silently retried, because a retry after a
//! transport failure could double-create the order.

use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::CreateOrderRequest;
use crate::domain::{EstimateRequest, Order, RateType, SwapIntent};
use crate::error::{Result, SwapError};
use crate::exchange::ExchangeApi;
use crate::persistence::OrderStore;
use crate::services::RateEstimator;

pub struct OrderCoordinator {
    api: Arc<dyn ExchangeApi>,
    store: Arc<OrderStore>,
    estimator: Arc<RateEstimator>,
    quote_ttl: ChronoDuration,
}

impl OrderCoordinator {
    pub fn new(
        api: Arc<dyn ExchangeApi>,
        store: Arc<OrderStore>,
        estimator: Arc<RateEstimator>,
        quote_ttl_secs: u64,
    ) -> Self {
        Self {
            api,
            store,
            estimator,
            quote_ttl: ChronoDuration::seconds(quote_ttl_secs as i64),
        }
    }

    /// Create the order for `intent` and record it locally. For fixed-rate
    /// swaps a usable rate id is secured first; a rate id the exchange no
    /// longer recognizes surfaces as `StaleQuote` so the caller re-estimates
    /// before the user tries again.
    pub async fn create(&self, intent: &SwapIntent) -> Result<Order> {
        self.check_intent(intent)?;

        let rate_id = match intent.rate_type {
            RateType::Floating => None,
            RateType::Fixed => Some(self.fresh_rate_id(intent).await?),
        };

        let request = CreateOrderRequest {
            from: intent.from.clone(),
            to: intent.to.clone(),
            amount: intent.amount,
            address: intent.recipient_address.clone(),
            refund_address: intent.refund_address.clone(),
            rate_id,
        };

        let attempt = match intent.rate_type {
            RateType::Floating => self.api.create_order(&request).await,
            RateType::Fixed => self.api.create_fixed_order(&request).await,
        };

        let order = match attempt {
            Ok(order) => order,
            Err(e) if e.is_retryable() => {
                // The request may have reached the exchange. Creating again
                // would risk a duplicate order, so report instead.
                warn!("order creation outcome unknown: {}", e);
                return Err(SwapError::OrderOutcomeUnknown(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        self.store.append(&order).await?;
        info!(
            "created order {} ({}, {} {})",
            order.id,
            order.route(),
            order.amount_expected_from,
            order.currency_from.to_uppercase()
        );
        Ok(order)
    }

    fn check_intent(&self, intent: &SwapIntent) -> Result<()> {
        if intent.amount <= Decimal::ZERO {
            return Err(SwapError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if intent.recipient_address.trim().is_empty() {
            return Err(SwapError::Validation(
                "recipient address must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Rate id for a fixed-rate order: reuse the estimator's current quote
    /// when it matches this intent exactly and is inside the TTL, otherwise
    /// take a fresh fixed estimate.
    async fn fresh_rate_id(&self, intent: &SwapIntent) -> Result<String> {
        let request = EstimateRequest {
            from: intent.from.clone(),
            to: intent.to.clone(),
            amount: intent.amount,
            rate_type: RateType::Fixed,
        };

        if let Some(latest) = self.estimator.latest().await {
            if latest.request.same_inputs(&request) && latest.age() <= self.quote_ttl {
                if let Some(rate_id) = latest.rate_id {
                    return Ok(rate_id);
                }
            }
        }

        let estimate = self.estimator.estimate(request).await?;
        estimate
            .rate_id
            .ok_or_else(|| SwapError::Quote("fixed estimate returned no rate id".to_string()))
    }
}
