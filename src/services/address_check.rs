//! Recipient address validation against the exchange's per-currency rules.
//!
//! Keystroke-driven input is debounced so a burst of edits costs one API
//! call; blur and submit validate immediately. A network failure is not a
//! verdict on the address, so it surfaces as `Unavailable` rather than
//! `Invalid`.

use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::exchange::ExchangeApi;
use crate::services::Debouncer;

/// Outcome of an address check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressCheck {
    Valid,
    /// Exchange rejected the address; message is display-ready.
    Invalid(String),
    /// The check itself failed (transport, rate limit). The address may
    /// still be fine.
    Unavailable(String),
}

impl AddressCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, AddressCheck::Valid)
    }
}

pub struct AddressValidator {
    api: Arc<dyn ExchangeApi>,
    debounce: Debouncer,
}

impl AddressValidator {
    pub fn new(api: Arc<dyn ExchangeApi>, debounce_delay: Duration) -> Self {
        Self {
            api,
            debounce: Debouncer::new(debounce_delay),
        }
    }

    /// Validate after the debounce quiet period. Returns `None` when a later
    /// edit superseded this one before the period elapsed; only the trailing
    /// edit of a burst reaches the API.
    pub async fn on_input(&self, currency: &str, address: &str) -> Option<AddressCheck> {
        if !self.debounce.settle().await {
            debug!("address check for {:?} superseded before firing", address);
            return None;
        }
        Some(self.check(currency, address).await)
    }

    /// Validate immediately (blur, submit). Cancels any pending debounced
    /// check so a stale keystroke result cannot land after this one.
    pub async fn validate_now(&self, currency: &str, address: &str) -> AddressCheck {
        self.debounce.cancel_pending();
        self.check(currency, address).await
    }

    async fn check(&self, currency: &str, address: &str) -> AddressCheck {
        if address.trim().is_empty() {
            return AddressCheck::Invalid("address must not be empty".to_string());
        }

        match self.api.validate_address(currency, address).await {
            Ok(response) if response.result => AddressCheck::Valid,
            Ok(response) => AddressCheck::Invalid(
                response
                    .message
                    .unwrap_or_else(|| format!("invalid {} address", currency.to_uppercase())),
            ),
            Err(e) => {
                warn!("address validation unavailable: {}", e);
                AddressCheck::Unavailable(e.to_string())
            }
        }
    }
}

/// Convenience wrapper for one-shot callers that do not care about
/// availability vs validity.
pub async fn is_address_valid(
    api: &dyn ExchangeApi,
    currency: &str,
    address: &str,
) -> Result<bool> {
    let response = api.validate_address(currency, address).await?;
    Ok(response.result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AddressValidationResponse;
    use crate::test_support::{ScriptItem, ScriptedExchange};
    use std::sync::atomic::Ordering;

    fn valid() -> ScriptItem<AddressValidationResponse> {
        ScriptItem::ok(AddressValidationResponse {
            result: true,
            message: None,
        })
    }

    fn invalid(message: &str) -> ScriptItem<AddressValidationResponse> {
        ScriptItem::ok(AddressValidationResponse {
            result: false,
            message: Some(message.to_string()),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_costs_one_call() {
        let api = Arc::new(ScriptedExchange::new());
        api.validations.lock().unwrap().push_back(valid());

        let validator = AddressValidator::new(api.clone(), Duration::from_millis(500));
        let (a, b, c) = tokio::join!(
            validator.on_input("eth", "0xa"),
            validator.on_input("eth", "0xab"),
            validator.on_input("eth", "0xabc"),
        );

        assert_eq!(a, None);
        assert_eq!(b, None);
        assert_eq!(c, Some(AddressCheck::Valid));

        assert_eq!(api.validate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *api.validated_addresses.lock().unwrap(),
            vec!["0xabc".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_blur_revalidates_even_when_unchanged() {
        let api = Arc::new(ScriptedExchange::new());
        {
            let mut validations = api.validations.lock().unwrap();
            validations.push_back(valid());
            validations.push_back(valid());
        }

        let validator = AddressValidator::new(api.clone(), Duration::from_millis(500));
        assert_eq!(
            validator.on_input("eth", "0xabc").await,
            Some(AddressCheck::Valid)
        );
        assert!(validator.validate_now("eth", "0xabc").await.is_valid());

        assert_eq!(api.validate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejection_carries_exchange_message() {
        let api = Arc::new(ScriptedExchange::new());
        api.validations
            .lock()
            .unwrap()
            .push_back(invalid("checksum mismatch"));

        let validator = AddressValidator::new(api, Duration::from_millis(500));
        let check = validator.validate_now("eth", "0xbad").await;
        assert_eq!(check, AddressCheck::Invalid("checksum mismatch".to_string()));
    }

    #[tokio::test]
    async fn test_network_failure_is_unavailable_not_invalid() {
        let api = Arc::new(ScriptedExchange::new());
        api.validations
            .lock()
            .unwrap()
            .push_back(ScriptItem::network_error());

        let validator = AddressValidator::new(api, Duration::from_millis(500));
        match validator.validate_now("eth", "0xabc").await {
            AddressCheck::Unavailable(_) => {}
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_address_short_circuits() {
        let api = Arc::new(ScriptedExchange::new());
        let validator = AddressValidator::new(api.clone(), Duration::from_millis(500));

        match validator.validate_now("eth", "   ").await {
            AddressCheck::Invalid(_) => {}
            other => panic!("expected Invalid, got {other:?}"),
        }
        assert_eq!(api.validate_calls.load(Ordering::SeqCst), 0);
    }
}
