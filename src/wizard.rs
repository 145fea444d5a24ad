//! Multi-step swap session: receive currency, send currency, amount and
//! addresses, then payin and tracking. The wizard owns the per-session state
//! and delegates the actual work to the estimator, the address validator and
//! the order coordinator.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::{send_options_for, Estimate, EstimateRequest, Order, RateType, SwapIntent};
use crate::error::{Result, SwapError};
use crate::exchange::ExchangeApi;
use crate::persistence::OrderStore;
use crate::services::{AddressCheck, AddressValidator, OrderCoordinator, RateEstimator, TaskHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    ChooseReceive,
    ChooseSend,
    EnterDetails,
    /// Order created; waiting for the user to fund the payin address.
    AwaitPayin,
    TrackStatus,
}

pub struct SwapWizard {
    api: Arc<dyn ExchangeApi>,
    store: Arc<OrderStore>,
    estimator: Arc<RateEstimator>,
    validator: AddressValidator,
    coordinator: OrderCoordinator,
    refresh_interval: Duration,
    /// Live re-estimation loop while the details step shows an estimate.
    refresh: Option<TaskHandle>,

    step: WizardStep,
    receive: Option<String>,
    send: Option<String>,
    send_options: Vec<String>,
    amount: Option<Decimal>,
    rate_type: RateType,
    recipient: Option<String>,
    refund: Option<String>,
    recipient_check: Option<AddressCheck>,
    order: Option<Order>,
}

impl SwapWizard {
    pub fn new(api: Arc<dyn ExchangeApi>, store: Arc<OrderStore>, config: &AppConfig) -> Self {
        let estimator = Arc::new(RateEstimator::new(api.clone(), config.fees.clone()));
        let validator = AddressValidator::new(
            api.clone(),
            Duration::from_millis(config.validator.debounce_ms),
        );
        let coordinator = OrderCoordinator::new(
            api.clone(),
            store.clone(),
            estimator.clone(),
            config.fees.quote_ttl_secs,
        );

        Self {
            api,
            store,
            estimator,
            validator,
            coordinator,
            refresh_interval: Duration::from_secs(config.estimator.refresh_interval_secs),
            refresh: None,
            step: WizardStep::ChooseReceive,
            receive: None,
            send: None,
            send_options: Vec::new(),
            amount: None,
            rate_type: RateType::Floating,
            recipient: None,
            refund: None,
            recipient_check: None,
            order: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn estimator(&self) -> &Arc<RateEstimator> {
        &self.estimator
    }

    /// The terms gate sits before anything else in the flow.
    pub async fn ensure_terms_accepted(&self) -> Result<()> {
        if self.store.terms_accepted().await? {
            Ok(())
        } else {
            Err(SwapError::Validation(
                "terms of service have not been accepted".to_string(),
            ))
        }
    }

    pub async fn accept_terms(&self) -> Result<()> {
        self.store.set_terms_accepted(true).await
    }

    /// Pick the receive currency; returns the send currencies that can
    /// reach it.
    pub async fn choose_receive(&mut self, ticker: &str) -> Result<Vec<String>> {
        self.ensure_terms_accepted().await?;

        let pairs = self.api.get_pairs(None, Some(ticker)).await?;
        let options = send_options_for(&pairs, ticker);
        if options.is_empty() {
            return Err(SwapError::UnsupportedPair {
                from: "*".to_string(),
                to: ticker.to_string(),
            });
        }

        self.receive = Some(ticker.to_ascii_lowercase());
        self.send_options = options.clone();
        self.send = None;
        self.stop_refresh();
        self.estimator.clear().await;
        self.step = WizardStep::ChooseSend;
        Ok(options)
    }

    /// Pick the send currency from the options of the chosen receive
    /// currency.
    pub async fn choose_send(&mut self, ticker: &str) -> Result<()> {
        let receive = self.require_receive()?;

        if !self
            .send_options
            .iter()
            .any(|option| option.eq_ignore_ascii_case(ticker))
        {
            return Err(SwapError::UnsupportedPair {
                from: ticker.to_string(),
                to: receive,
            });
        }

        self.send = Some(ticker.to_ascii_lowercase());
        self.stop_refresh();
        self.estimator.clear().await;
        self.step = WizardStep::EnterDetails;
        Ok(())
    }

    /// Update the send amount; a positive amount triggers a fresh estimate.
    pub async fn set_amount(&mut self, amount: Decimal) -> Result<Estimate> {
        if amount <= Decimal::ZERO {
            return Err(SwapError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        self.amount = Some(amount);
        self.refresh_estimate().await
    }

    /// Switch between floating and fixed; re-estimates with the new mode.
    pub async fn set_rate_type(&mut self, rate_type: RateType) -> Result<Option<Estimate>> {
        self.rate_type = rate_type;
        if self.amount.is_none() {
            return Ok(None);
        }
        self.refresh_estimate().await.map(Some)
    }

    /// Recipient edited; debounced validation. `None` means a later edit
    /// superseded this one.
    pub async fn recipient_input(&mut self, address: &str) -> Result<Option<AddressCheck>> {
        let receive = self.require_receive()?;
        self.recipient = Some(address.to_string());

        let check = self.validator.on_input(&receive, address).await;
        if let Some(check) = &check {
            self.recipient_check = Some(check.clone());
        }
        Ok(check)
    }

    /// Recipient field blurred or form submitted; validates immediately.
    pub async fn recipient_blur(&mut self) -> Result<AddressCheck> {
        let receive = self.require_receive()?;
        let address = self
            .recipient
            .clone()
            .ok_or_else(|| SwapError::Validation("recipient address is empty".to_string()))?;

        let check = self.validator.validate_now(&receive, &address).await;
        self.recipient_check = Some(check.clone());
        Ok(check)
    }

    pub fn set_refund_address(&mut self, address: Option<String>) {
        self.refund = address;
    }

    /// Create the order. Every input must be in place and the recipient
    /// address confirmed valid.
    pub async fn submit(&mut self) -> Result<&Order> {
        if self.step != WizardStep::EnterDetails {
            return Err(SwapError::Validation(
                "wizard is not at the details step".to_string(),
            ));
        }

        let intent = self.build_intent()?;
        match &self.recipient_check {
            Some(check) if check.is_valid() => {}
            Some(AddressCheck::Invalid(message)) => {
                return Err(SwapError::Validation(message.clone()))
            }
            _ => {
                // never been checked, or the check itself failed; settle it
                // now rather than creating against an unvetted address
                let check = self.recipient_blur().await?;
                if !check.is_valid() {
                    return Err(SwapError::Validation(match check {
                        AddressCheck::Invalid(message) => message,
                        AddressCheck::Unavailable(message) => message,
                        AddressCheck::Valid => unreachable!(),
                    }));
                }
            }
        }

        let order = self.coordinator.create(&intent).await?;
        info!("wizard created order {}", order.id);
        self.stop_refresh();
        self.order = Some(order);
        self.step = WizardStep::AwaitPayin;
        Ok(self.order.as_ref().unwrap())
    }

    /// User confirmed they sent the deposit; move to tracking.
    pub fn mark_sent(&mut self) -> Result<()> {
        if self.step != WizardStep::AwaitPayin {
            return Err(SwapError::Validation(
                "no order is awaiting payment".to_string(),
            ));
        }
        self.step = WizardStep::TrackStatus;
        Ok(())
    }

    /// Reopen the session on a stored order (deep link / restart).
    pub async fn resume(&mut self, order_id: &str) -> Result<&Order> {
        let order = self
            .store
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| SwapError::Validation(format!("unknown order id {order_id}")))?;

        self.stop_refresh();
        self.step = WizardStep::TrackStatus;
        self.order = Some(order);
        Ok(self.order.as_ref().unwrap())
    }

    /// One step back through the flow; order state is kept.
    pub fn back(&mut self) {
        self.stop_refresh();
        self.step = match self.step {
            WizardStep::ChooseReceive | WizardStep::ChooseSend => WizardStep::ChooseReceive,
            WizardStep::EnterDetails => WizardStep::ChooseSend,
            WizardStep::AwaitPayin => WizardStep::EnterDetails,
            WizardStep::TrackStatus => WizardStep::AwaitPayin,
        };
    }

    /// Fresh session; the store is untouched.
    pub async fn reset(&mut self) {
        self.stop_refresh();
        self.step = WizardStep::ChooseReceive;
        self.receive = None;
        self.send = None;
        self.send_options.clear();
        self.amount = None;
        self.rate_type = RateType::Floating;
        self.recipient = None;
        self.refund = None;
        self.recipient_check = None;
        self.order = None;
        self.estimator.clear().await;
    }

    async fn refresh_estimate(&mut self) -> Result<Estimate> {
        let request = self.estimate_request()?;
        let estimate = self.estimator.estimate(request.clone()).await?;

        // quotes go stale upstream; keep re-estimating the shown inputs
        // until the step changes
        self.stop_refresh();
        self.refresh = Some(self.estimator.spawn_refresh(request, self.refresh_interval));
        Ok(estimate)
    }

    fn stop_refresh(&mut self) {
        if let Some(handle) = self.refresh.take() {
            handle.stop();
        }
    }

    fn estimate_request(&self) -> Result<EstimateRequest> {
        Ok(EstimateRequest {
            from: self.require_send()?,
            to: self.require_receive()?,
            amount: self
                .amount
                .ok_or_else(|| SwapError::Validation("amount is not set".to_string()))?,
            rate_type: self.rate_type,
        })
    }

    fn build_intent(&self) -> Result<SwapIntent> {
        let request = self.estimate_request()?;
        Ok(SwapIntent {
            from: request.from,
            to: request.to,
            amount: request.amount,
            recipient_address: self
                .recipient
                .clone()
                .ok_or_else(|| SwapError::Validation("recipient address is empty".to_string()))?,
            refund_address: self.refund.clone(),
            rate_type: self.rate_type,
        })
    }

    fn require_receive(&self) -> Result<String> {
        self.receive
            .clone()
            .ok_or_else(|| SwapError::Validation("receive currency is not chosen".to_string()))
    }

    fn require_send(&self) -> Result<String> {
        self.send
            .clone()
            .ok_or_else(|| SwapError::Validation("send currency is not chosen".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AddressValidationResponse, FloatingQuoteResponse};
    use crate::domain::{OrderStatus, Pair};
    use crate::test_support::{sample_order, ScriptItem, ScriptedExchange};
    use rust_decimal_macros::dec;

    fn pair(from: &str, to: &str) -> Pair {
        Pair {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    async fn wizard(api: Arc<ScriptedExchange>) -> (SwapWizard, Arc<OrderStore>) {
        let store = Arc::new(OrderStore::open(":memory:").await.unwrap());
        let config = AppConfig::default_config("https://api.example.com", ":memory:");
        let wizard = SwapWizard::new(api, store.clone(), &config);
        (wizard, store)
    }

    #[tokio::test]
    async fn test_terms_gate_blocks_the_flow() {
        let api = Arc::new(ScriptedExchange::new());
        let (mut wizard, _) = wizard(api).await;

        assert!(matches!(
            wizard.choose_receive("eth").await.unwrap_err(),
            SwapError::Validation(_)
        ));

        wizard.accept_terms().await.unwrap();
        // terms persist; the gate stays open for later sessions
        assert!(wizard.ensure_terms_accepted().await.is_ok());
    }

    #[tokio::test]
    async fn test_happy_path_floating_swap() {
        let api = Arc::new(ScriptedExchange::new());
        *api.pairs.lock().unwrap() = vec![pair("btc", "eth"), pair("ltc", "eth")];
        api.floating
            .lock()
            .unwrap()
            .push_back(ScriptItem::ok(FloatingQuoteResponse {
                amount_to: dec!(7.2),
                network_fee: dec!(0.01),
            }));
        api.validations
            .lock()
            .unwrap()
            .push_back(ScriptItem::ok(AddressValidationResponse {
                result: true,
                message: None,
            }));
        api.creations
            .lock()
            .unwrap()
            .push_back(ScriptItem::ok(sample_order("abc123", OrderStatus::Waiting)));

        let (mut wizard, store) = wizard(api).await;
        wizard.accept_terms().await.unwrap();

        let options = wizard.choose_receive("eth").await.unwrap();
        assert_eq!(options, vec!["btc".to_string(), "ltc".to_string()]);
        assert_eq!(wizard.step(), WizardStep::ChooseSend);

        wizard.choose_send("btc").await.unwrap();
        assert_eq!(wizard.step(), WizardStep::EnterDetails);

        let estimate = wizard.set_amount(dec!(0.5)).await.unwrap();
        assert_eq!(estimate.receive_amount, dec!(7.1252));

        wizard.recipient = Some("0xpayout".to_string());
        assert!(wizard.recipient_blur().await.unwrap().is_valid());

        let order = wizard.submit().await.unwrap();
        assert_eq!(order.id, "abc123");
        assert_eq!(wizard.step(), WizardStep::AwaitPayin);
        assert!(store.find_by_id("abc123").await.unwrap().is_some());

        wizard.mark_sent().unwrap();
        assert_eq!(wizard.step(), WizardStep::TrackStatus);
    }

    #[tokio::test]
    async fn test_details_step_keeps_estimate_fresh_until_left() {
        let api = Arc::new(ScriptedExchange::new());
        *api.pairs.lock().unwrap() = vec![pair("btc", "eth")];
        {
            let mut floating = api.floating.lock().unwrap();
            for _ in 0..3 {
                floating.push_back(ScriptItem::ok(FloatingQuoteResponse {
                    amount_to: dec!(7.2),
                    network_fee: dec!(0.01),
                }));
            }
        }

        let (mut wizard, _) = wizard(api.clone()).await;
        wizard.accept_terms().await.unwrap();
        wizard.choose_receive("eth").await.unwrap();
        wizard.choose_send("btc").await.unwrap();
        wizard.set_amount(dec!(0.5)).await.unwrap();
        // pause only after setup: sqlite store calls run on a dedicated
        // thread and time out under an auto-advancing paused clock
        tokio::time::pause();

        // refresh interval is 20s; two background refreshes land within 45s
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(
            api.estimate_calls.load(std::sync::atomic::Ordering::SeqCst),
            3
        );

        // leaving the details step stops the loop
        wizard.back();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(
            api.estimate_calls.load(std::sync::atomic::Ordering::SeqCst),
            3
        );
    }

    #[tokio::test]
    async fn test_send_currency_must_reach_receive() {
        let api = Arc::new(ScriptedExchange::new());
        *api.pairs.lock().unwrap() = vec![pair("btc", "eth")];

        let (mut wizard, _) = wizard(api).await;
        wizard.accept_terms().await.unwrap();
        wizard.choose_receive("eth").await.unwrap();

        match wizard.choose_send("doge").await.unwrap_err() {
            SwapError::UnsupportedPair { from, to } => {
                assert_eq!(from, "doge");
                assert_eq!(to, "eth");
            }
            other => panic!("expected UnsupportedPair, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_receive_currency_is_rejected() {
        let api = Arc::new(ScriptedExchange::new());

        let (mut wizard, _) = wizard(api).await;
        wizard.accept_terms().await.unwrap();
        assert!(matches!(
            wizard.choose_receive("xmr").await.unwrap_err(),
            SwapError::UnsupportedPair { .. }
        ));
        assert_eq!(wizard.step(), WizardStep::ChooseReceive);
    }

    #[tokio::test]
    async fn test_submit_blocks_on_invalid_recipient() {
        let api = Arc::new(ScriptedExchange::new());
        *api.pairs.lock().unwrap() = vec![pair("btc", "eth")];
        api.floating
            .lock()
            .unwrap()
            .push_back(ScriptItem::ok(FloatingQuoteResponse {
                amount_to: dec!(7.2),
                network_fee: dec!(0.01),
            }));
        api.validations
            .lock()
            .unwrap()
            .push_back(ScriptItem::ok(AddressValidationResponse {
                result: false,
                message: Some("checksum mismatch".to_string()),
            }));

        let (mut wizard, store) = wizard(api.clone()).await;
        wizard.accept_terms().await.unwrap();
        wizard.choose_receive("eth").await.unwrap();
        wizard.choose_send("btc").await.unwrap();
        wizard.set_amount(dec!(0.5)).await.unwrap();
        wizard.recipient = Some("0xbad".to_string());
        wizard.recipient_blur().await.unwrap();

        match wizard.submit().await.unwrap_err() {
            SwapError::Validation(message) => assert_eq!(message, "checksum mismatch"),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(
            api.create_calls.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_reopens_stored_order() {
        let api = Arc::new(ScriptedExchange::new());
        let (mut wizard, store) = wizard(api).await;
        store
            .append(&sample_order("abc123", OrderStatus::Exchanging))
            .await
            .unwrap();

        let order = wizard.resume("abc123").await.unwrap();
        assert_eq!(order.status, OrderStatus::Exchanging);
        assert_eq!(wizard.step(), WizardStep::TrackStatus);

        assert!(wizard.resume("missing").await.is_err());
    }
}
