use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rate mode for a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    Floating,
    Fixed,
}

impl Default for RateType {
    fn default() -> Self {
        Self::Floating
    }
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Floating => "floating",
            Self::Fixed => "fixed",
        }
    }
}

impl std::fmt::Display for RateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RateType {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "floating" | "float" => Ok(Self::Floating),
            "fixed" | "fix" => Ok(Self::Fixed),
            _ => Err("invalid rate type; expected floating|fixed"),
        }
    }
}

/// Order status as reported by the exchange
///
/// The exchange is authoritative; we classify, we do not enforce transition
/// legality. Unknown raw strings are preserved and treated as non-terminal so
/// polling keeps going instead of wedging an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    New,
    Waiting,
    Confirming,
    Exchanging,
    Sending,
    Hold,
    Finished,
    Failed,
    Refunded,
    Overdue,
    Expired,
    Unknown(String),
}

impl OrderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "new" => Self::New,
            "waiting" => Self::Waiting,
            "confirming" => Self::Confirming,
            "exchanging" => Self::Exchanging,
            "sending" => Self::Sending,
            "hold" => Self::Hold,
            "finished" => Self::Finished,
            "failed" => Self::Failed,
            "refunded" => Self::Refunded,
            "overdue" => Self::Overdue,
            "expired" => Self::Expired,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "new",
            Self::Waiting => "waiting",
            Self::Confirming => "confirming",
            Self::Exchanging => "exchanging",
            Self::Sending => "sending",
            Self::Hold => "hold",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Overdue => "overdue",
            Self::Expired => "expired",
            Self::Unknown(raw) => raw,
        }
    }

    /// No further state change is expected after a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed | Self::Refunded | Self::Overdue | Self::Expired
        )
    }

    /// User-facing progress copy for the tracking view.
    pub fn progress_message(&self) -> &'static str {
        match self {
            Self::New | Self::Waiting => "Waiting to receive your deposit at the payin address",
            Self::Confirming => "Payment received, waiting for network confirmations",
            Self::Exchanging => "Payment confirmed, your coins are being exchanged",
            Self::Sending => "Coins are on their way to the recipient address",
            Self::Finished => "Coins were successfully sent to the recipient address",
            Self::Failed => "Transaction failed; contact exchange support",
            Self::Refunded => "Exchange failed, funds refunded to the sending address",
            Self::Hold => "Exchange delayed by KYC/AML review; contact exchange support",
            Self::Overdue | Self::Expired => "Payment was not sent within the allowed timeframe",
            Self::Unknown(_) => "Exchange reported an unrecognized status",
        }
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An exchange order (tracked locally from creation to terminal status)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Assigned by the exchange at creation; never changes.
    pub id: String,
    pub currency_from: String,
    pub currency_to: String,
    /// Advisory after creation; the exchange settles the real amounts.
    pub amount_expected_from: Decimal,
    pub amount_expected_to: Decimal,
    /// Where the user must send funds (exchange-assigned).
    pub payin_address: String,
    /// Destination supplied by the user.
    pub payout_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<String>,
    #[serde(default)]
    pub rate_type: RateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_id: Option<String>,
    pub status: OrderStatus,
    #[serde(
        deserialize_with = "timestamp::deserialize",
        serialize_with = "timestamp::serialize"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_url: Option<String>,
}

impl Order {
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }

    pub fn route(&self) -> String {
        format!(
            "{} -> {}",
            self.currency_from.to_uppercase(),
            self.currency_to.to_uppercase()
        )
    }
}

/// Validated wizard inputs handed to the order coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIntent {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub recipient_address: String,
    pub refund_address: Option<String>,
    pub rate_type: RateType,
}

/// Timestamp (de)serialization for order records.
///
/// The exchange has shipped `createdAt` both as unix seconds and as unix
/// milliseconds. One convention internally: milliseconds. Numeric values
/// large enough to already be milliseconds pass through, smaller values are
/// scaled up; RFC3339 strings are accepted too.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const MILLIS_THRESHOLD: i64 = 100_000_000_000;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => {
                let millis = if n >= MILLIS_THRESHOLD { n } else { n * 1000 };
                DateTime::from_timestamp_millis(millis)
                    .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {n}")))
            }
            Raw::Text(s) => s
                .parse::<DateTime<Utc>>()
                .map_err(serde::de::Error::custom),
        }
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_parse_roundtrip() {
        assert_eq!(OrderStatus::parse("waiting"), OrderStatus::Waiting);
        assert_eq!(OrderStatus::parse("FINISHED"), OrderStatus::Finished);
        assert_eq!(
            OrderStatus::parse("verifying"),
            OrderStatus::Unknown("verifying".to_string())
        );
    }

    #[test]
    fn test_terminal_classification() {
        for status in [
            OrderStatus::Finished,
            OrderStatus::Failed,
            OrderStatus::Refunded,
            OrderStatus::Overdue,
            OrderStatus::Expired,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
        for status in [
            OrderStatus::New,
            OrderStatus::Waiting,
            OrderStatus::Confirming,
            OrderStatus::Exchanging,
            OrderStatus::Sending,
            OrderStatus::Hold,
            OrderStatus::Unknown("verifying".to_string()),
        ] {
            assert!(!status.is_terminal(), "{status} should not be terminal");
        }
    }

    #[test]
    fn test_order_deserializes_second_and_millisecond_timestamps() {
        let payload = |created_at: &str| {
            format!(
                r#"{{
                    "id": "abc123",
                    "currencyFrom": "btc",
                    "currencyTo": "eth",
                    "amountExpectedFrom": "0.5",
                    "amountExpectedTo": "7.2",
                    "payinAddress": "bc1qpayin",
                    "payoutAddress": "0xpayout",
                    "status": "waiting",
                    "createdAt": {created_at}
                }}"#
            )
        };

        let secs: Order =
            serde_json::from_str(&payload("1700000000")).expect("seconds should parse");
        let millis: Order =
            serde_json::from_str(&payload("1700000000000")).expect("milliseconds should parse");

        assert_eq!(secs.created_at, millis.created_at);
        assert_eq!(secs.amount_expected_from, dec!(0.5));
        assert_eq!(secs.status, OrderStatus::Waiting);
        assert_eq!(secs.rate_type, RateType::Floating);
    }
}
