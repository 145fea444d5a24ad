use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Base URL of the exchange-aggregator REST API
    pub api_url: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    /// Exchange fee for floating-rate swaps, percent of the quoted amount
    #[serde(default = "default_floating_fee_pct")]
    pub floating_fee_pct: Decimal,
    /// Exchange fee for fixed-rate swaps, percent of the quoted amount
    #[serde(default = "default_fixed_fee_pct")]
    pub fixed_fee_pct: Decimal,
    /// Seconds a fixed-rate quote stays usable for order creation
    #[serde(default = "default_quote_ttl_secs")]
    pub quote_ttl_secs: u64,
}

fn default_floating_fee_pct() -> Decimal {
    Decimal::new(9, 1) // 0.9%
}

fn default_fixed_fee_pct() -> Decimal {
    Decimal::ONE // 1.0%
}

fn default_quote_ttl_secs() -> u64 {
    30
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            floating_fee_pct: default_floating_fee_pct(),
            fixed_fee_pct: default_fixed_fee_pct(),
            quote_ttl_secs: default_quote_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorConfig {
    /// Quotes go stale on their own; refresh the active estimate this often
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval_secs() -> u64 {
    20
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Quiet period after the last keystroke before validating, milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Interval between status polls (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    /// Minimum spacing between successful polls for the same order id
    /// (seconds); suppresses concurrent UI surfaces hammering one id
    #[serde(default = "default_min_spacing_secs")]
    pub min_spacing_secs: u64,
    /// Orders older than this are dropped from active background polling
    /// (hours); they stay in the store for history
    #[serde(default = "default_recency_window_hours")]
    pub recency_window_hours: u64,
    /// Maximum orders to poll per background cycle
    #[serde(default = "default_max_orders_per_cycle")]
    pub max_orders_per_cycle: usize,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_min_spacing_secs() -> u64 {
    5
}

fn default_recency_window_hours() -> u64 {
    24
}

fn default_max_orders_per_cycle() -> usize {
    50
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            min_spacing_secs: default_min_spacing_secs(),
            recency_window_hours: default_recency_window_hours(),
            max_orders_per_cycle: default_max_orders_per_cycle(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path (or "sqlite::memory:" for an ephemeral store)
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("exchange.request_timeout_ms", 10_000i64)?
            .set_default("poller.interval_secs", 5i64)?
            .set_default("store.path", "swapdeck.db")?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SWAPDECK_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SWAPDECK_EXCHANGE__API_URL, etc.)
            .add_source(
                Environment::with_prefix("SWAPDECK")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for CLI usage
    pub fn default_config(api_url: &str, store_path: &str) -> Self {
        Self {
            exchange: ExchangeConfig {
                api_url: api_url.to_string(),
                request_timeout_ms: default_request_timeout_ms(),
            },
            fees: FeeConfig::default(),
            estimator: EstimatorConfig::default(),
            validator: ValidatorConfig::default(),
            poller: PollerConfig::default(),
            store: StoreConfig {
                path: store_path.to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.exchange.api_url.trim().is_empty() {
            errors.push("exchange.api_url must be set".to_string());
        }

        if self.fees.floating_fee_pct < Decimal::ZERO
            || self.fees.floating_fee_pct >= Decimal::from(100)
        {
            errors.push("fees.floating_fee_pct must be in [0, 100)".to_string());
        }

        if self.fees.fixed_fee_pct < Decimal::ZERO || self.fees.fixed_fee_pct >= Decimal::from(100)
        {
            errors.push("fees.fixed_fee_pct must be in [0, 100)".to_string());
        }

        if self.poller.interval_secs == 0 {
            errors.push("poller.interval_secs must be positive".to_string());
        }

        if self.poller.min_spacing_secs > self.poller.recency_window_hours * 3600 {
            errors.push("poller.min_spacing_secs exceeds the recency window".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fee_defaults_match_display_math() {
        let fees = FeeConfig::default();
        assert_eq!(fees.floating_fee_pct, dec!(0.9));
        assert_eq!(fees.fixed_fee_pct, dec!(1.0));
    }

    #[test]
    fn test_validate_rejects_empty_api_url() {
        let config = AppConfig::default_config("", "swapdeck.db");
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("api_url")));
    }

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::default_config("https://api.example.com", "swapdeck.db");
        assert!(config.validate().is_ok());
    }
}
