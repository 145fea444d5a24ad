//! Rate estimation with the fee breakdown the user sees.
//!
//! Estimates are requested on every input change and on a fixed refresh
//! interval (quotes go stale upstream). Publication is last-request-wins: a
//! slow response for an old request never overwrites the estimate of a newer
//! one.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{debug, warn};

use super::TaskHandle;
use crate::config::FeeConfig;
use crate::domain::{Bounds, Estimate, EstimateRequest, RateType};
use crate::error::{Result, SwapError};
use crate::exchange::ExchangeApi;

/// Fixed-point scale for all displayed/compared currency amounts.
const AMOUNT_SCALE: u32 = 8;

fn trunc(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToZero)
}

pub struct RateEstimator {
    api: Arc<dyn ExchangeApi>,
    fees: FeeConfig,
    generation: AtomicU64,
    latest: RwLock<Option<(u64, Estimate)>>,
}

impl RateEstimator {
    pub fn new(api: Arc<dyn ExchangeApi>, fees: FeeConfig) -> Self {
        Self {
            api,
            fees,
            generation: AtomicU64::new(0),
            latest: RwLock::new(None),
        }
    }

    /// Run one estimate and publish it unless a newer request was issued
    /// while this one was in flight. The caller gets this call's result
    /// either way; the displayed estimate should come from `latest`.
    pub async fn estimate(&self, request: EstimateRequest) -> Result<Estimate> {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.fetch(&request).await;

        // Superseded responses never publish, whatever the newer request's
        // outcome was. Comparing against the issue counter (not the last
        // published generation) keeps a slow old response from resurfacing
        // inputs the user already abandoned.
        if self.generation.load(Ordering::SeqCst) != my_generation {
            debug!(
                "discarding superseded estimate for {} -> {} (generation {})",
                request.from, request.to, my_generation
            );
            return result;
        }

        let estimate = result?;
        *self.latest.write().await = Some((my_generation, estimate.clone()));
        Ok(estimate)
    }

    /// Most recently published estimate, if any.
    pub async fn latest(&self) -> Option<Estimate> {
        self.latest.read().await.as_ref().map(|(_, e)| e.clone())
    }

    pub async fn clear(&self) {
        *self.latest.write().await = None;
    }

    /// Re-estimate `request` on a fixed interval until stopped. Errors are
    /// transient: the previous published estimate stays up.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        request: EstimateRequest,
        interval: Duration,
    ) -> TaskHandle {
        let handle = TaskHandle::new();
        let estimator = self.clone();
        let task = handle.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the caller already has a fresh estimate; skip the immediate tick
            ticker.tick().await;

            while task.is_running() {
                ticker.tick().await;
                if !task.is_running() {
                    break;
                }
                if let Err(e) = estimator.estimate(request.clone()).await {
                    warn!("estimate refresh failed: {}", e);
                }
            }
            debug!("estimate refresh for {} -> {} stopped", request.from, request.to);
        });

        handle
    }

    async fn fetch(&self, request: &EstimateRequest) -> Result<Estimate> {
        match request.rate_type {
            RateType::Floating => {
                let quote = self
                    .api
                    .estimate_floating(&request.from, &request.to, request.amount)
                    .await?;
                Ok(self.breakdown(
                    request,
                    quote.amount_to,
                    quote.network_fee,
                    self.fees.floating_fee_pct,
                    None,
                    None,
                ))
            }
            RateType::Fixed => {
                let quote = self
                    .api
                    .estimate_fixed(&request.from, &request.to, request.amount)
                    .await?;
                let bounds = Bounds {
                    min: quote.min,
                    max: quote.max,
                };
                if !bounds.contains(request.amount) {
                    return Err(out_of_bounds(request, &bounds));
                }
                Ok(self.breakdown(
                    request,
                    quote.amount_to,
                    quote.network_fee,
                    self.fees.fixed_fee_pct,
                    Some(quote.rate_id),
                    Some(bounds),
                ))
            }
        }
    }

    fn breakdown(
        &self,
        request: &EstimateRequest,
        amount_to: Decimal,
        network_fee: Decimal,
        fee_pct: Decimal,
        rate_id: Option<String>,
        bounds: Option<Bounds>,
    ) -> Estimate {
        let exchange_fee = trunc(amount_to * fee_pct / Decimal::from(100));
        let receive_amount = trunc(amount_to - network_fee - exchange_fee);

        Estimate {
            request: request.clone(),
            amount_to,
            network_fee,
            exchange_fee,
            receive_amount,
            rate_id,
            bounds,
            taken_at: Utc::now(),
        }
    }
}

/// Precise bound message so the form can echo the violated limit rather
/// than a generic failure.
fn out_of_bounds(request: &EstimateRequest, bounds: &Bounds) -> SwapError {
    let ticker = request.from.to_uppercase();
    if request.amount < bounds.min {
        SwapError::Validation(format!("MINIMUM AMOUNT IS {} {}", bounds.min, ticker))
    } else {
        SwapError::Validation(format!("MAXIMUM AMOUNT IS {} {}", bounds.max, ticker))
    }
}
