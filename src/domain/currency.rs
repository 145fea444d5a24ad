use serde::{Deserialize, Serialize};

/// Full currency metadata from the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyInfo {
    pub ticker: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub blockchain: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub payin_confirmations: Option<u32>,
}

/// A tradable route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub from: String,
    pub to: String,
}

/// Unique send currencies that can reach the chosen receive currency.
///
/// Ticker comparison is case-insensitive; the returned tickers keep their
/// first-seen spelling and order.
pub fn send_options_for(pairs: &[Pair], receive: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    pairs
        .iter()
        .filter(|pair| pair.to.eq_ignore_ascii_case(receive))
        .filter_map(|pair| {
            seen.insert(pair.from.to_ascii_lowercase())
                .then(|| pair.from.clone())
        })
        .collect()
}
